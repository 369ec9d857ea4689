//! CSV export of lots.
//!
//! Fields are quoted per RFC 4180 when they contain a delimiter,
//! quote or newline, so lot names with commas survive a round trip
//! through a spreadsheet.

use crate::{BatchArchive, LotbookError, Lot, TreeMeasurement};
use chrono::NaiveDate;
use serde::Serialize;
use std::io::Write;

pub const HEADER: [&str; 9] = [
    "Lot",
    "Tree",
    "Method",
    "Segment",
    "CumulativeHeight_m",
    "SegmentLength_m",
    "CaptureMethod",
    "Distance_m",
    "TotalHeight_m",
];

/// Extra trailing column in archive-wide exports.
pub const DATE_COLUMN: &str = "Date";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A rendered export, ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvExport {
    pub file_name: String,
    pub contents: String,
}

/// Renders one lot, without a date column.
pub fn export_lot(lot: &Lot) -> Result<String, LotbookError> {
    if lot.measurements().is_empty() {
        return Err(LotbookError::NothingToExport);
    }
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADER)?;
    write_rows(&mut wtr, lot, None)?;
    into_string(wtr)
}

/// Renders every archived lot followed by `active`, if it has any
/// measurements.
///
/// Archived rows are dated by the lot's last save (blank if it was
/// never saved); the active lot is dated `today`.
pub fn export_archive(
    archive: &BatchArchive,
    active: Option<&Lot>,
    today: NaiveDate,
) -> Result<String, LotbookError> {
    let active = active.filter(|lot| !lot.measurements().is_empty());
    if archive.is_empty() && active.is_none() {
        return Err(LotbookError::NothingToExport);
    }
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(HEADER.iter().chain(std::iter::once(&DATE_COLUMN)))?;
    for lot in archive.lots() {
        let date = lot
            .saved_at()
            .map(|at| at.date_naive().format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        write_rows(&mut wtr, lot, Some(&date))?;
    }
    if let Some(lot) = active {
        let date = today.format(DATE_FORMAT).to_string();
        write_rows(&mut wtr, lot, Some(&date))?;
    }
    into_string(wtr)
}

/// Download name for an export of `lot_name`, or of everything when
/// `None`.
pub fn file_name(lot_name: Option<&str>, date: NaiveDate) -> String {
    let label = match lot_name {
        Some(name) => name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect(),
        None => "ALL".to_string(),
    };
    format!("tree_heights_{label}_{}.csv", date.format(DATE_FORMAT))
}

/// Measurements by tree number, `MethodA` before `MethodB`.
fn ordered(lot: &Lot) -> Vec<&TreeMeasurement> {
    let mut measurements: Vec<&TreeMeasurement> = lot.measurements().iter().collect();
    measurements.sort_by_key(|m| (m.tree_number(), m.method()));
    measurements
}

fn write_rows<W: Write>(
    wtr: &mut csv::Writer<W>,
    lot: &Lot,
    date: Option<&str>,
) -> Result<(), LotbookError> {
    for measurement in ordered(lot) {
        for segment in measurement.segments() {
            let mut record = vec![
                lot.name().to_string(),
                measurement.tree_number().to_string(),
                measurement.method().to_string(),
                segment.index().to_string(),
                format!("{:.2}", segment.cumulative_height()),
                format!("{:.2}", segment.length()),
                segment.capture_method().to_string(),
                format!(
                    "{:.2}",
                    segment.distance().unwrap_or(measurement.distance())
                ),
                format!("{:.2}", measurement.total_height()),
            ];
            if let Some(date) = date {
                record.push(date.to_string());
            }
            wtr.write_record(&record)?;
        }
    }
    Ok(())
}

fn into_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, LotbookError> {
    let bytes = wtr
        .into_inner()
        .map_err(|err| LotbookError::Io(err.into_error()))?;
    String::from_utf8(bytes).map_err(|err| LotbookError::Malformed(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{export_archive, export_lot, file_name};
    use crate::{
        testutil::{at, lot, measurement},
        BatchArchive, LotbookError, Method,
    };
    use chrono::NaiveDate;

    const HEADER_LINE: &str = "Lot,Tree,Method,Segment,CumulativeHeight_m,SegmentLength_m,CaptureMethod,Distance_m,TotalHeight_m";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_single_lot() {
        let norte = lot("Norte", vec![measurement(1, Method::MethodA, &[1.6, 8.2])]);
        let csv = export_lot(&norte).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                HEADER_LINE,
                "Norte,1,MethodA,1,1.60,1.60,manual,15.00,8.20",
                "Norte,1,MethodA,2,8.20,6.60,manual,15.00,8.20",
            ]
        );
    }

    #[test]
    fn test_rows_ordered_by_tree_then_method() {
        let norte = lot(
            "Norte",
            vec![
                measurement(2, Method::MethodB, &[4.0]),
                measurement(1, Method::MethodB, &[3.0]),
                measurement(2, Method::MethodA, &[5.0]),
                measurement(1, Method::MethodA, &[2.0]),
            ],
        );
        let csv = export_lot(&norte).unwrap();
        let keys: Vec<String> = csv
            .lines()
            .skip(1)
            .map(|line| line.split(',').skip(1).take(2).collect::<Vec<_>>().join(","))
            .collect();
        assert_eq!(keys, vec!["1,MethodA", "1,MethodB", "2,MethodA", "2,MethodB"]);
    }

    #[test]
    fn test_names_with_commas_are_quoted() {
        let odd = lot("Norte, parcela 2", vec![measurement(1, Method::MethodA, &[3.0])]);
        let csv = export_lot(&odd).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("\"Norte, parcela 2\",1,MethodA,"));

        let mut rdr = csv::Reader::from_reader(csv.as_bytes());
        let record = rdr.records().next().unwrap().unwrap();
        assert_eq!(record.len(), 9);
        assert_eq!(&record[0], "Norte, parcela 2");
    }

    #[test]
    fn test_empty_lot_has_nothing_to_export() {
        assert!(matches!(
            export_lot(&lot("Norte", vec![])),
            Err(LotbookError::NothingToExport)
        ));
        assert!(matches!(
            export_archive(&BatchArchive::new(), Some(&lot("Norte", vec![])), today()),
            Err(LotbookError::NothingToExport)
        ));
    }

    #[test]
    fn test_archive_dates_and_active_lot() {
        let mut archive = BatchArchive::new();
        let mut sur = lot("Sur", vec![measurement(1, Method::MethodA, &[4.0])]);
        sur.set_saved_at(at(20));
        archive.save(sur);
        archive.save(lot("Este", vec![measurement(3, Method::MethodB, &[6.0])]));
        let active = lot("Norte", vec![measurement(1, Method::MethodA, &[2.5])]);

        let csv = export_archive(&archive, Some(&active), today()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], format!("{HEADER_LINE},Date"));
        assert_eq!(lines[1], "Sur,1,MethodA,1,4.00,4.00,manual,15.00,4.00,2024-05-20");
        assert_eq!(lines[2], "Este,3,MethodB,1,6.00,6.00,manual,15.00,6.00,");
        assert_eq!(lines[3], "Norte,1,MethodA,1,2.50,2.50,manual,15.00,2.50,2024-06-01");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(Some("Norte 2/B"), today()),
            "tree_heights_Norte_2_B_2024-06-01.csv"
        );
        assert_eq!(file_name(None, today()), "tree_heights_ALL_2024-06-01.csv");
    }
}
