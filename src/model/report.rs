//! Presentation of tallies: flat result rows and the spreadsheet export.

use chrono::{DateTime, Utc};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, XlsxError};
use serde::{Deserialize, Serialize};

use crate::model::{
    db::election::Election,
    tally::{Leader, Tally},
};

pub const SHEET_NAME: &str = "Results";

/// One line of the flat results listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    pub position: String,
    pub candidate: String,
    pub votes: u64,
}

/// Every (position, candidate) pair in ballot order, followed by a total row.
pub fn result_rows(election: &Election, tally: &Tally) -> Vec<ResultRow> {
    let mut rows = Vec::new();
    for (p, position) in election.positions.iter().enumerate() {
        for (c, candidate) in position.candidates.iter().enumerate() {
            rows.push(ResultRow {
                position: position.name.clone(),
                candidate: candidate.clone(),
                votes: tally.votes_for(p, c),
            });
        }
    }
    rows.push(ResultRow {
        position: "TOTAL".to_string(),
        candidate: "Total Votes Cast".to_string(),
        votes: tally.total_votes(),
    });
    rows
}

/// `count` as a share of `total`, to two decimal places.
pub fn percentage(count: u64, total: u64) -> String {
    if total == 0 {
        "0%".to_string()
    } else {
        format!("{:.2}%", count as f64 * 100.0 / total as f64)
    }
}

/// Layout of the exported report, independent of the file format.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub title: String,
    pub closed: bool,
    pub generated_at: DateTime<Utc>,
    pub total_votes: u64,
    pub total_selections: u64,
    pub sections: Vec<Section>,
}

/// The block of the report for a single position.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub position: String,
    pub rows: Vec<CandidateLine>,
    pub subtotal: u64,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLine {
    pub candidate: String,
    pub votes: u64,
    pub percentage: String,
}

impl Report {
    pub fn new(election: &Election, tally: &Tally, generated_at: DateTime<Utc>) -> Self {
        let sections = election
            .positions
            .iter()
            .enumerate()
            .map(|(p, position)| {
                let subtotal = tally.position_total(p);
                let rows = position
                    .candidates
                    .iter()
                    .enumerate()
                    .map(|(c, candidate)| {
                        let votes = tally.votes_for(p, c);
                        CandidateLine {
                            candidate: candidate.clone(),
                            votes,
                            percentage: percentage(votes, subtotal),
                        }
                    })
                    .collect();
                let name = |c: usize| position.candidate(c).unwrap_or_default().to_string();
                let outcome = match tally.leader(p) {
                    Leader::Nobody => "No votes".to_string(),
                    Leader::Winner(c) => format!("Winner: {}", name(c)),
                    Leader::Tie(cs) => format!(
                        "Tie: {}",
                        cs.into_iter().map(name).collect::<Vec<_>>().join(", ")
                    ),
                };
                Section {
                    position: position.name.clone(),
                    rows,
                    subtotal,
                    outcome,
                }
            })
            .collect();

        Self {
            title: election.title.clone(),
            closed: election.closed,
            generated_at,
            total_votes: tally.total_votes(),
            total_selections: tally.total_selections(),
            sections,
        }
    }

    /// A download file name derived from the title.
    pub fn file_name(&self) -> String {
        let stem: String = self
            .title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let stem = match stem.trim_matches('_') {
            "" => "election",
            stem => stem,
        };
        format!("{stem}_results.xlsx")
    }

    /// Render the report as a single-sheet XLSX workbook.
    pub fn to_xlsx(&self) -> Result<Vec<u8>, XlsxError> {
        let title_format = Format::new()
            .set_bold()
            .set_font_size(16)
            .set_align(FormatAlign::Center);
        let label_format = Format::new().set_bold();
        let section_format = Format::new()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(0x1E3A8A));
        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(0xDCE6F1))
            .set_border(FormatBorder::Thin);
        let cell_format = Format::new().set_border(FormatBorder::Thin);
        let number_format = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Right);
        let subtotal_format = Format::new()
            .set_bold()
            .set_border(FormatBorder::Thin)
            .set_background_color(Color::RGB(0xF2F2F2));
        let outcome_format = Format::new().set_italic();

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.set_name(SHEET_NAME)?;
        sheet.set_column_width(0, 32)?;
        sheet.set_column_width(1, 12)?;
        sheet.set_column_width(2, 14)?;

        // Title and summary.
        sheet.merge_range(0, 0, 0, 2, &self.title, &title_format)?;
        sheet.write_string_with_format(2, 0, "Status", &label_format)?;
        sheet.write_string(2, 1, if self.closed { "Closed" } else { "Open" })?;
        sheet.write_string_with_format(3, 0, "Total votes", &label_format)?;
        sheet.write_number(3, 1, self.total_votes as f64)?;
        sheet.write_string_with_format(4, 0, "Generated", &label_format)?;
        sheet.write_string(4, 1, self.generated_at.format("%Y-%m-%d %H:%M UTC").to_string())?;

        // One block per position.
        let mut row = 6;
        for section in &self.sections {
            sheet.merge_range(row, 0, row, 2, &section.position, &section_format)?;
            row += 1;
            sheet.write_string_with_format(row, 0, "Candidate", &header_format)?;
            sheet.write_string_with_format(row, 1, "Votes", &header_format)?;
            sheet.write_string_with_format(row, 2, "Percentage", &header_format)?;
            row += 1;
            for line in &section.rows {
                sheet.write_string_with_format(row, 0, &line.candidate, &cell_format)?;
                sheet.write_number_with_format(row, 1, line.votes as f64, &number_format)?;
                sheet.write_string_with_format(row, 2, &line.percentage, &number_format)?;
                row += 1;
            }
            sheet.write_string_with_format(row, 0, "Subtotal", &subtotal_format)?;
            sheet.write_number_with_format(row, 1, section.subtotal as f64, &subtotal_format)?;
            sheet.write_string_with_format(
                row,
                2,
                percentage(section.subtotal, section.subtotal),
                &subtotal_format,
            )?;
            row += 1;
            sheet.write_string_with_format(row, 0, &section.outcome, &outcome_format)?;
            row += 2;
        }

        // Overall summary.
        sheet.merge_range(row, 0, row, 2, "Summary", &section_format)?;
        row += 1;
        sheet.write_string_with_format(row, 0, "Positions", &label_format)?;
        sheet.write_number(row, 1, self.sections.len() as f64)?;
        row += 1;
        sheet.write_string_with_format(row, 0, "Total votes cast", &label_format)?;
        sheet.write_number(row, 1, self.total_votes as f64)?;
        row += 1;
        sheet.write_string_with_format(row, 0, "Total selections", &label_format)?;
        sheet.write_number(row, 1, self.total_selections as f64)?;

        workbook.save_to_buffer()
    }
}
