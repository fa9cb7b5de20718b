use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::names::{parse_footnotes, parse_nlp_list, strip_footnotes};
use crate::types::{
    AttendanceEntry, AttendanceQuery, AttendanceRecord, AttendanceStatus, FormRequest,
    SessionBlock,
};
use crate::utils::{DateWindow, yearly_ranges};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Expected pattern not found: {0}")]
    MissingPattern(String),
    #[error("Failed to parse URL: {0}")]
    UrlParse(String),
    #[error("Failed to parse date: {0}")]
    DateParse(String),
    #[error("Missing required field: {0}")]
    MissingField(String),
}

static RE_TREEMAP_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\.open\(\\'(abms2/asistsala/ConsAsistencia\.asp[^']*)\\',")
        .expect("invalid regex: treemap link")
});

static RE_PREFORM_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="(ConsAsistenciaBrief\.asp[^"]*)""#).expect("invalid regex: preform link")
});

static RE_FORM_ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<FORM METHOD=POST ACTION="([^"]+)""#).expect("invalid regex: form action")
});

static RE_HIDDEN_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<INPUT TYPE=HIDDEN[^<]* NAME="([^"]+)" VALUE="([^"]+)">"#)
        .expect("invalid regex: hidden input")
});

static RE_DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r">Rango de asistencias disponibles para el Cuerpo en la Legislatura: (\d{2}/\d{2}/\d{4}) - (\d{2}/\d{2}/\d{4})<",
    )
    .expect("invalid regex: date range")
});

static RE_SESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) del (\d{2}/\d{2}/\d{4})").expect("invalid regex: session")
});

static STATUS_PATTERNS: LazyLock<Vec<(AttendanceStatus, Regex)>> = LazyLock::new(|| {
    [
        (
            AttendanceStatus::Present,
            r"Asisten los señores (?:Senadores|Representantes): (.*)\.",
        ),
        (AttendanceStatus::AbsentWithWarning, r"Faltan? con aviso: (.*)\."),
        (AttendanceStatus::AbsentWithoutWarning, r"Faltan? sin aviso: (.*)\."),
        (AttendanceStatus::OnVacation, r"Con licencia: (.*)\."),
    ]
    .into_iter()
    .map(|(status, pattern)| {
        let regex = Regex::new(pattern).expect("invalid regex: status sentence");
        (status, regex)
    })
    .collect()
});

const PROCESSING_MARKER: &str = "innerHTML = 'Procesando Sesiones";

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn resolve_url(base: &str, href: &str) -> Result<String, ParseError> {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(String::from)
        .map_err(|e| ParseError::UrlParse(format!("'{}' against '{}': {}", href, base, e)))
}

fn parse_date(date: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(date, "%d/%m/%Y")
        .map_err(|e| ParseError::DateParse(format!("{}: {}", date, e)))
}

/// Splits an attendance cell into text lines at `<br>` elements. Text comes
/// out decoded; bold footnote markers keep their `<b>` wrapping.
fn cell_lines(cell: ElementRef) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for child in cell.children() {
        if let Some(text) = child.value().as_text() {
            current.push_str(text);
        } else if let Some(element) = ElementRef::wrap(child) {
            match element.value().name() {
                "br" => chunks.push(std::mem::take(&mut current)),
                "b" => current.push_str(&format!("<b>{}</b>", elem_text(element))),
                _ => current.push_str(&elem_text(element)),
            }
        }
    }
    chunks.push(current);

    chunks
        .iter()
        .flat_map(|chunk| chunk.lines())
        .map(|line| line.replace('\u{a0}', " ").trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Links to the per-chamber attendance pages, embedded in `window.open` calls.
pub fn parse_treemap(html: &str, page_url: &str) -> Result<Vec<String>, ParseError> {
    RE_TREEMAP_LINK
        .captures_iter(html)
        .map(|caps| resolve_url(page_url, &caps[1]))
        .collect()
}

/// Links from a chamber page to its query forms.
pub fn parse_preform(html: &str, page_url: &str) -> Result<Vec<String>, ParseError> {
    RE_PREFORM_LINK
        .captures_iter(html)
        .map(|caps| resolve_url(page_url, &caps[1]))
        .collect()
}

/// Builds the form submissions for a query form page, one per calendar year
/// of the range the page offers, clamped to `window`.
///
/// A page whose range does not overlap the window yields no requests.
pub fn prepare_form(
    html: &str,
    page_url: &str,
    window: &DateWindow,
) -> Result<Vec<FormRequest>, ParseError> {
    let action = RE_FORM_ACTION
        .captures(html)
        .ok_or_else(|| ParseError::MissingPattern(format!("form action in {}", page_url)))?;
    let form_url = resolve_url(page_url, &action[1])?;

    let hidden: BTreeMap<String, String> = RE_HIDDEN_INPUT
        .captures_iter(html)
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect();

    let range = RE_DATE_RANGE.captures(html).ok_or_else(|| {
        ParseError::MissingPattern(format!("available date range in {}", page_url))
    })?;
    let (available_min, available_max) = (parse_date(&range[1])?, parse_date(&range[2])?);

    let Some((min, max)) = window.clamp(available_min, available_max) else {
        log::info!(
            "Skipping {}: available range {} - {} is outside the configured window",
            page_url,
            available_min,
            available_max
        );
        return Ok(Vec::new());
    };

    let requests = yearly_ranges(min, max)
        .into_iter()
        .map(|(from, to)| {
            let mut fields = BTreeMap::from([
                ("fecDesde".to_string(), from.format("%d%m%Y").to_string()),
                ("fecHasta".to_string(), to.format("%d%m%Y").to_string()),
            ]);
            fields.extend(hidden.clone());

            FormRequest {
                url: form_url.clone(),
                fields,
            }
        })
        .collect();

    Ok(requests)
}

/// Extracts the sessions of a result page by their structural anchors: the
/// diary links directly under `<center>`, the tables following them and the
/// progress scripts naming each session, paired in document order.
pub fn parse_sessions(html: &str, page_url: &str) -> Result<Vec<SessionBlock>, ParseError> {
    let document = Html::parse_document(html);
    let anchor_sel = Selector::parse("center > a").unwrap();
    let table_sel = Selector::parse("center > a ~ table").unwrap();
    let script_sel = Selector::parse("script").unwrap();
    let cell_sel = Selector::parse("tr > td > div").unwrap();

    let anchors: Vec<ElementRef> = document.select(&anchor_sel).collect();
    let tables: Vec<ElementRef> = document.select(&table_sel).collect();
    let scripts: Vec<ElementRef> = document
        .select(&script_sel)
        .filter(|script| elem_text(*script).contains(PROCESSING_MARKER))
        .collect();

    if anchors.len() != tables.len() || tables.len() != scripts.len() {
        log::warn!(
            "Unbalanced result page {}: {} links, {} tables, {} session scripts",
            page_url,
            anchors.len(),
            tables.len(),
            scripts.len()
        );
    }

    let mut sessions = Vec::new();

    for ((anchor, table), script) in anchors.into_iter().zip(tables).zip(scripts) {
        let script_text = elem_text(script);
        let caps = RE_SESSION.captures(&script_text).ok_or_else(|| {
            ParseError::MissingPattern(format!("session number in '{}'", script_text.trim()))
        })?;

        let session = caps[1]
            .parse::<u32>()
            .map_err(|_| ParseError::MissingField(format!("session number {}", &caps[1])))?;
        let session_date = parse_date(&caps[2])?;

        let session_diary = match anchor.value().attr("href").map(str::trim) {
            Some(href) if !href.to_lowercase().starts_with("javascript:") => {
                Some(resolve_url(page_url, href)?)
            }
            _ => None,
        };

        let cell = table.select(&cell_sel).next().ok_or_else(|| {
            ParseError::MissingPattern(format!("attendance cell for session {}", session))
        })?;

        sessions.push(SessionBlock {
            session,
            session_date,
            session_diary,
            lines: cell_lines(cell),
        });
    }

    Ok(sessions)
}

/// Matches every line against the attendance sentences and splits the
/// named people out of each match.
pub fn extract_attendance<S: AsRef<str>>(lines: &[S]) -> Vec<AttendanceEntry> {
    let footnotes = parse_footnotes(lines);
    let mut entries = Vec::new();

    for line in lines {
        let line = line.as_ref();

        for (status, pattern) in STATUS_PATTERNS.iter() {
            let Some(caps) = pattern.captures(line) else {
                continue;
            };

            for name in parse_nlp_list(&caps[1]) {
                let (attendee, notes) = strip_footnotes(&name, &footnotes);
                if attendee.is_empty() {
                    continue;
                }
                entries.push(AttendanceEntry {
                    attendee,
                    status: *status,
                    notes,
                });
            }
        }
    }

    entries
}

pub fn parse_form_result(
    html: &str,
    page_url: &str,
    query: &AttendanceQuery,
) -> Result<Vec<AttendanceRecord>, ParseError> {
    let sessions = parse_sessions(html, page_url)?;

    let records = sessions
        .into_iter()
        .flat_map(|block| {
            extract_attendance(&block.lines)
                .into_iter()
                .map(move |entry| AttendanceRecord {
                    legislature: query.legislature.clone(),
                    chamber: query.chamber.clone(),
                    session: block.session,
                    session_date: block.session_date,
                    session_diary: block.session_diary.clone(),
                    attendee: entry.attendee,
                    status: entry.status,
                    notes: entry.notes,
                })
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const BASE: &str = "https://www.example.gub.uy/palacio3/index1.asp";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_treemap_from_fixture() {
        let html = fs::read_to_string("fixtures/treemap.html").expect("Failed to read fixture");

        let urls = parse_treemap(&html, BASE).expect("Failed to parse treemap");

        assert_eq!(
            urls,
            vec![
                "https://www.example.gub.uy/palacio3/abms2/asistsala/ConsAsistencia.asp?Cuerpo=S",
                "https://www.example.gub.uy/palacio3/abms2/asistsala/ConsAsistencia.asp?Cuerpo=D",
            ]
        );
    }

    #[test]
    fn test_parse_preform_from_fixture() {
        let html = fs::read_to_string("fixtures/preform.html").expect("Failed to read fixture");
        let url = "https://www.example.gub.uy/palacio3/abms2/asistsala/ConsAsistencia.asp?Cuerpo=S";

        let urls = parse_preform(&html, url).expect("Failed to parse preform");

        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| u.starts_with(
            "https://www.example.gub.uy/palacio3/abms2/asistsala/ConsAsistenciaBrief.asp?"
        )));
        assert!(urls[0].ends_with("Legislatura=47"));
    }

    #[test]
    fn test_parse_preform_without_links() {
        let urls = parse_preform("<html><body>Sin datos</body></html>", BASE).unwrap();
        assert!(urls.is_empty());
    }

    #[test]
    fn test_prepare_form_splits_by_year() {
        let html = fs::read_to_string("fixtures/form.html").expect("Failed to read fixture");
        let url = "https://www.example.gub.uy/palacio3/abms2/asistsala/ConsAsistenciaBrief.asp?Cuerpo=S&Legislatura=47";
        let window = DateWindow {
            start_date: Some(date(2012, 6, 1)),
            end_date: Some(date(2013, 3, 31)),
        };

        let requests = prepare_form(&html, url, &window).expect("Failed to prepare form");

        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].url,
            "https://www.example.gub.uy/palacio3/abms2/asistsala/ConsAsistenciaBrief_Resultado.asp"
        );
        assert_eq!(requests[0].field("fecDesde"), Some("01062012"));
        assert_eq!(requests[0].field("fecHasta"), Some("31122012"));
        assert_eq!(requests[1].field("fecDesde"), Some("01012013"));
        assert_eq!(requests[1].field("fecHasta"), Some("31032013"));

        let query = requests[1].query().expect("Should carry the query ids");
        assert_eq!(query.legislature, "47");
        assert_eq!(query.chamber, "S");
    }

    #[test]
    fn test_prepare_form_open_window_uses_page_range() {
        let html = fs::read_to_string("fixtures/form.html").expect("Failed to read fixture");

        let requests =
            prepare_form(&html, BASE, &DateWindow::default()).expect("Failed to prepare form");

        assert_eq!(requests.len(), 6);
        assert_eq!(requests[0].field("fecDesde"), Some("15022010"));
        assert_eq!(requests[5].field("fecHasta"), Some("14022015"));
    }

    #[test]
    fn test_prepare_form_without_overlap() {
        let html = fs::read_to_string("fixtures/form.html").expect("Failed to read fixture");
        let window = DateWindow {
            start_date: Some(date(2016, 1, 1)),
            end_date: None,
        };

        let requests = prepare_form(&html, BASE, &window).expect("Failed to prepare form");
        assert!(requests.is_empty());
    }

    #[test]
    fn test_prepare_form_missing_range() {
        let html = r#"<FORM METHOD=POST ACTION="Resultado.asp"></FORM>"#;

        let err = prepare_form(html, BASE, &DateWindow::default()).unwrap_err();
        assert!(matches!(err, ParseError::MissingPattern(_)));
    }

    #[test]
    fn test_prepare_form_hidden_fields_override() {
        let html = concat!(
            r#"<FORM METHOD=POST ACTION="Resultado.asp">"#,
            r#"<INPUT TYPE=HIDDEN NAME="fecHasta" VALUE="fixed">"#,
            r#"<td>Rango de asistencias disponibles para el Cuerpo en la Legislatura: 01/03/2011 - 30/06/2011</td>"#,
        );

        let requests = prepare_form(html, BASE, &DateWindow::default()).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].field("fecDesde"), Some("01032011"));
        assert_eq!(requests[0].field("fecHasta"), Some("fixed"));
    }

    #[test]
    fn test_parse_sessions_from_fixture() {
        let html =
            fs::read_to_string("fixtures/form_result.html").expect("Failed to read fixture");

        let sessions = parse_sessions(&html, BASE).expect("Failed to parse sessions");

        assert_eq!(sessions.len(), 2);

        let first = &sessions[0];
        assert_eq!(first.session, 12);
        assert_eq!(first.session_date, date(2012, 3, 6));
        assert_eq!(
            first.session_diary.as_deref(),
            Some("https://www.example.gub.uy/palacio3/diarios/ds12.pdf")
        );
        assert_eq!(first.lines.len(), 4);

        let second = &sessions[1];
        assert_eq!(second.session, 13);
        assert_eq!(second.session_date, date(2012, 3, 7));
        assert!(
            second.session_diary.is_none(),
            "javascript links should not be kept as diaries"
        );
    }

    #[test]
    fn test_parse_sessions_missing_cell() {
        let html = r#"
            <html><body>
            <script>document.getElementById('p').innerHTML = 'Procesando Sesiones 5 del 01/02/2012';</script>
            <center><a href="ds5.pdf">Sesión 5</a><table><tr><td>vacío</td></tr></table></center>
            </body></html>
        "#;

        let err = parse_sessions(html, BASE).unwrap_err();
        assert!(matches!(err, ParseError::MissingPattern(_)));
    }

    #[test]
    fn test_extract_attendance() {
        let lines = [
            "Asisten los señores Representantes: Juan Pérez, Ana López <b>(1)</b> y María García.",
            "Faltan con aviso: Pedro Gómez.",
            "Falta sin aviso: Luis Suárez.",
            "Con licencia: José y Korzeniak.",
            "<b>(1)</b> Se retiró a las 18 horas.",
        ];

        let entries = extract_attendance(&lines);

        let summary: Vec<(&str, AttendanceStatus)> = entries
            .iter()
            .map(|e| (e.attendee.as_str(), e.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Juan Pérez", AttendanceStatus::Present),
                ("Ana López", AttendanceStatus::Present),
                ("María García", AttendanceStatus::Present),
                ("Pedro Gómez", AttendanceStatus::AbsentWithWarning),
                ("Luis Suárez", AttendanceStatus::AbsentWithoutWarning),
                ("José y Korzeniak", AttendanceStatus::OnVacation),
            ]
        );
        assert_eq!(entries[1].notes, vec!["Se retiró a las 18 horas."]);
        assert!(entries[0].notes.is_empty());
    }

    #[test]
    fn test_parse_sessions_decodes_cell_text() {
        let html = r#"
            <html><body>
            <script>document.getElementById('p').innerHTML = 'Procesando Sesiones 5 del 01/02/2012';</script>
            <center><a href="ds5.pdf">Sesión 5</a><table><tr><td><div>Faltan con aviso: Pedro G&oacute;mez &amp; Hijos <b>(1)</b>.<br>Con&nbsp;licencia: Ana &lt;L&oacute;pez&gt;.<br><b>(1)</b> Lleg&oacute; tarde.</div></td></tr></table></center>
            </body></html>
        "#;
        let query = AttendanceQuery {
            legislature: "47".to_string(),
            chamber: "S".to_string(),
        };

        let sessions = parse_sessions(html, BASE).expect("Failed to parse sessions");
        assert_eq!(
            sessions[0].lines,
            vec![
                "Faltan con aviso: Pedro Gómez & Hijos <b>(1)</b>.",
                "Con licencia: Ana <López>.",
                "<b>(1)</b> Llegó tarde.",
            ]
        );

        let records = parse_form_result(html, BASE, &query).expect("Failed to parse result");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].attendee, "Pedro Gómez & Hijos");
        assert_eq!(records[0].notes, vec!["Llegó tarde."]);
        assert_eq!(records[1].attendee, "Ana <López>");
    }

    #[test]
    fn test_extract_attendance_ignores_other_lines() {
        let entries = extract_attendance(&["Se levanta la sesión.", "Preside: Juan Pérez."]);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_form_result_from_fixture() {
        let html =
            fs::read_to_string("fixtures/form_result.html").expect("Failed to read fixture");
        let query = AttendanceQuery {
            legislature: "47".to_string(),
            chamber: "S".to_string(),
        };

        let records = parse_form_result(&html, BASE, &query).expect("Failed to parse result");

        assert_eq!(records.len(), 7);
        assert!(records.iter().all(|r| r.legislature == "47" && r.chamber == "S"));

        let noted = records
            .iter()
            .find(|r| r.attendee == "Ana López")
            .expect("Should find Ana López");
        assert_eq!(noted.session, 12);
        assert_eq!(noted.status, AttendanceStatus::Present);
        assert_eq!(noted.notes, vec!["Se retiró a las 18 horas."]);

        let on_leave: Vec<&str> = records
            .iter()
            .filter(|r| r.status == AttendanceStatus::OnVacation)
            .map(|r| r.attendee.as_str())
            .collect();
        assert_eq!(on_leave, vec!["Rafael Michelini"]);

        let second_session: Vec<&AttendanceRecord> =
            records.iter().filter(|r| r.session == 13).collect();
        assert_eq!(second_session.len(), 3);
        assert!(second_session.iter().all(|r| r.session_diary.is_none()));
    }
}
