//! Spreadsheet and printable-document generation.
//!
//! Tables go out as CSV; a single work order is rendered as a paginated
//! plain-text document using the dispatch sheet's two-row layout (identity,
//! date, time and contact on the first row; equipment and address on the
//! second). The two table exports can also be bundled into one zip archive.

use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::types::{HistoryRow, Location, WorkOrderRow};

/// Stops rendered per document page
const STOPS_PER_PAGE: usize = 6;

/// One stop of the printable document, independent of whether it came from
/// the active store or the archive.
#[derive(Debug, Clone)]
pub struct DocumentStop {
    pub location_name: String,
    pub scheduled_date: Option<NaiveDate>,
    pub scheduled_time: Option<NaiveTime>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub equipment: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub province: Option<String>,
}

impl From<&WorkOrderRow> for DocumentStop {
    fn from(row: &WorkOrderRow) -> Self {
        Self {
            location_name: row.location_name.clone(),
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            contact_name: row.contact_name.clone(),
            contact_phone: row.contact_phone.clone(),
            equipment: row.equipment.clone(),
            address: row.address.clone(),
            city: row.city.clone(),
            postal_code: row.postal_code.clone(),
            province: row.province.clone(),
        }
    }
}

impl From<&HistoryRow> for DocumentStop {
    fn from(row: &HistoryRow) -> Self {
        Self {
            location_name: row.location_name.clone(),
            scheduled_date: row.scheduled_date,
            scheduled_time: row.scheduled_time,
            contact_name: row.contact_name.clone(),
            contact_phone: row.contact_phone.clone(),
            equipment: row.equipment.clone(),
            address: row.address.clone(),
            city: row.city.clone(),
            postal_code: row.postal_code.clone(),
            province: row.province.clone(),
        }
    }
}

/// Serialize any serde-serializable row set to CSV with headers.
pub fn to_csv<T: serde::Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(vec![]);
    for row in rows {
        writer.serialize(row).context("Failed to serialize CSV row")?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

pub fn locations_csv(items: &[Location]) -> Result<String> {
    to_csv(items)
}

pub fn history_csv(items: &[HistoryRow]) -> Result<String> {
    to_csv(items)
}

/// Strip characters the print pipeline chokes on: em-dashes become plain
/// dashes, anything outside ASCII and Latin-1 accents is dropped.
pub fn sanitize(text: &str) -> String {
    text.replace('\u{2014}', "-")
        .chars()
        .filter(|c| c.is_ascii() || ('\u{00C0}'..='\u{00FF}').contains(c))
        .collect()
}

fn cell(value: &str, width: usize) -> String {
    let clean = sanitize(value);
    let truncated: String = clean.chars().take(width).collect();
    format!("{:<width$}", truncated, width = width)
}

fn two_row_block(stop: &DocumentStop) -> String {
    const W1: [usize; 5] = [30, 12, 10, 22, 14];
    const W2: [usize; 5] = [20, 32, 20, 7, 9];

    let date = stop
        .scheduled_date
        .map(|d| d.format("%d/%m/%Y").to_string())
        .unwrap_or_default();
    let time = stop
        .scheduled_time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_default();

    let line = |cells: &[String]| format!("| {} |", cells.join(" | "));

    let header1 = line(&[
        cell("Punto Vendita", W1[0]),
        cell("Data", W1[1]),
        cell("Orario", W1[2]),
        cell("Referente", W1[3]),
        cell("Telefono", W1[4]),
    ]);
    let row1 = line(&[
        cell(&stop.location_name, W1[0]),
        cell(&date, W1[1]),
        cell(&time, W1[2]),
        cell(stop.contact_name.as_deref().unwrap_or(""), W1[3]),
        cell(stop.contact_phone.as_deref().unwrap_or(""), W1[4]),
    ]);
    let header2 = line(&[
        cell("Attrezzature", W2[0]),
        cell("Indirizzo", W2[1]),
        cell("Citta", W2[2]),
        cell("CAP", W2[3]),
        cell("Provincia", W2[4]),
    ]);
    let row2 = line(&[
        cell(stop.equipment.as_deref().unwrap_or(""), W2[0]),
        cell(stop.address.as_deref().unwrap_or(""), W2[1]),
        cell(stop.city.as_deref().unwrap_or(""), W2[2]),
        cell(stop.postal_code.as_deref().unwrap_or(""), W2[3]),
        cell(stop.province.as_deref().unwrap_or(""), W2[4]),
    ]);

    let rule1 = "-".repeat(header1.chars().count());
    let rule2 = "-".repeat(header2.chars().count());

    format!(
        "{rule1}\n{header1}\n{row1}\n{rule2}\n{header2}\n{row2}\n{rule2}\n"
    )
}

/// Render the printable work order. Returns the document text and the page
/// count; pages are separated by a form feed.
pub fn work_order_document(
    order_number: i64,
    total_distance_km: Option<f64>,
    stops: &[DocumentStop],
) -> (String, i64) {
    let dates: Vec<String> = {
        let mut seen: Vec<String> = stops
            .iter()
            .filter_map(|s| s.scheduled_date)
            .map(|d| d.format("%d/%m/%Y").to_string())
            .collect();
        seen.sort();
        seen.dedup();
        seen
    };
    let names: Vec<String> = {
        let mut seen: Vec<String> = stops.iter().map(|s| sanitize(&s.location_name)).collect();
        seen.sort();
        seen.dedup();
        seen
    };

    let mut header = String::new();
    header.push_str("PROGRAMMA DI MANUTENZIONE\n");
    header.push_str(&format!("Ordine di lavoro N. {}\n", order_number));
    if dates.is_empty() {
        header.push_str("Programma del: nessuna data specificata\n");
    } else {
        header.push_str(&format!("Programma del: {}\n", dates.join(", ")));
    }
    header.push_str(&format!("Punti vendita: {}\n", names.join(", ")));
    if let Some(km) = total_distance_km {
        header.push_str(&format!("Distanza totale percorso: {:.1} km\n", km));
    }
    header.push('\n');

    let chunks: Vec<&[DocumentStop]> = if stops.is_empty() {
        vec![&[]]
    } else {
        stops.chunks(STOPS_PER_PAGE).collect()
    };
    let pages = chunks.len();

    let mut document = String::new();
    for (page_idx, chunk) in chunks.iter().enumerate() {
        if page_idx > 0 {
            document.push('\u{0C}');
        }
        document.push_str(&header);
        for stop in *chunk {
            document.push_str(&two_row_block(stop));
            document.push('\n');
        }
        document.push_str(&format!("Pagina {} di {}\n", page_idx + 1, pages));
    }

    (document, pages as i64)
}

/// Bundle the two table exports into one zip archive.
pub fn bundle_zip(locations_csv: &str, history_csv: &str) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer
        .start_file("locations.csv", options)
        .context("Failed to start locations.csv")?;
    writer.write_all(locations_csv.as_bytes())?;

    writer
        .start_file("history.csv", options)
        .context("Failed to start history.csv")?;
    writer.write_all(history_csv.as_bytes())?;

    let cursor = writer.finish().context("Failed to finish zip archive")?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(name: &str) -> DocumentStop {
        DocumentStop {
            location_name: name.to_string(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 2, 1),
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0),
            contact_name: Some("Sig. Bianchi".to_string()),
            contact_phone: Some("02 1234567".to_string()),
            equipment: Some("banco frigo".to_string()),
            address: Some("Via Roma 1".to_string()),
            city: Some("Milano".to_string()),
            postal_code: Some("20100".to_string()),
            province: Some("MI".to_string()),
        }
    }

    #[test]
    fn sanitize_replaces_em_dash_and_drops_exotic_chars() {
        assert_eq!(sanitize("a\u{2014}b"), "a-b");
        assert_eq!(sanitize("caffè ☕"), "caffè ");
    }

    #[test]
    fn document_contains_both_header_rows_per_stop() {
        let (doc, pages) = work_order_document(4, Some(13.6), &[stop("PV Milano")]);

        assert_eq!(pages, 1);
        assert!(doc.contains("Ordine di lavoro N. 4"));
        assert!(doc.contains("Punto Vendita"));
        assert!(doc.contains("Attrezzature"));
        assert!(doc.contains("PV Milano"));
        assert!(doc.contains("01/02/2026"));
        assert!(doc.contains("09:00"));
        assert!(doc.contains("13.6 km"));
    }

    #[test]
    fn document_paginates_long_orders() {
        let stops: Vec<DocumentStop> = (0..13).map(|i| stop(&format!("PV {}", i))).collect();
        let (doc, pages) = work_order_document(9, None, &stops);

        assert_eq!(pages, 3);
        assert_eq!(doc.matches('\u{0C}').count(), 2);
        assert!(doc.contains("Pagina 3 di 3"));
    }

    #[test]
    fn document_for_empty_order_is_single_page() {
        let (doc, pages) = work_order_document(1, None, &[]);
        assert_eq!(pages, 1);
        assert!(doc.contains("nessuna data specificata"));
    }

    #[test]
    fn csv_roundtrip_has_header_and_rows() {
        #[derive(serde::Serialize)]
        struct Row {
            name: String,
            km: f64,
        }
        let rows = vec![
            Row { name: "a".to_string(), km: 1.5 },
            Row { name: "b".to_string(), km: 2.0 },
        ];
        let csv = to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("name,km"));
        assert_eq!(lines.next(), Some("a,1.5"));
        assert_eq!(lines.next(), Some("b,2.0"));
    }

    #[test]
    fn bundle_zip_is_nonempty_archive() {
        let bytes = bundle_zip("a,b\n1,2\n", "c,d\n3,4\n").unwrap();
        // Zip local-file-header magic
        assert_eq!(&bytes[0..4], b"PK\x03\x04");
    }
}
