use std::io::Read;

use serde::Serialize;

use super::normalizer::normalize_header;
use super::HistoricalImportError;

/// Column positions resolved from the header row, with the header text that matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    pub name: ColumnRef,
    pub surname: ColumnRef,
    pub period: ColumnRef,
    pub credits: ColumnRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRef {
    pub index: usize,
    pub header: String,
}

/// One data line with its required cells, still unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawRow {
    pub(crate) line: u64,
    pub(crate) name: Option<String>,
    pub(crate) surname: Option<String>,
    pub(crate) period: Option<String>,
    pub(crate) credits: Option<String>,
    pub(crate) description: Option<String>,
}

/// Read the header, resolve the columns, then collect every data line.
///
/// Column resolution happens before any row is looked at, so a schema error never leaves
/// partially processed rows behind.
pub(crate) fn read_rows<R: Read>(
    mut reader: R,
) -> Result<(ColumnMapping, Vec<RawRow>), HistoricalImportError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(&text))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let columns = resolve_columns(&headers)?;

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map_or(index as u64 + 2, csv::Position::line);
        let cell = |column: &ColumnRef| {
            record
                .get(column.index)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        rows.push(RawRow {
            line,
            name: cell(&columns.name),
            surname: cell(&columns.surname),
            period: cell(&columns.period),
            credits: cell(&columns.credits),
            description: columns.description.as_ref().and_then(cell),
        });
    }

    Ok((columns, rows))
}

/// Legacy exports use either `,` or `;`. Semicolon files carry decimal commas.
fn sniff_delimiter(text: &str) -> u8 {
    let header = text
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn is_surname(header: &str) -> bool {
    header == "van"
        || header.starts_with("van ")
        || header.contains("surname")
        || header.contains("last name")
        || header.contains("lastname")
        || header.contains("family name")
}

fn is_name(header: &str) -> bool {
    !is_surname(header) && (header.contains("naam") || header.contains("name"))
}

fn is_period(header: &str) -> bool {
    header.contains("jaar") || header.contains("year") || header.contains("period")
}

fn is_credits(header: &str) -> bool {
    ["punt", "krediet", "credit", "point"]
        .iter()
        .any(|alias| header.contains(alias))
}

fn is_description(header: &str) -> bool {
    ["beskrywing", "description", "omskrywing", "note"]
        .iter()
        .any(|alias| header.contains(alias))
}

fn resolve_columns(headers: &[String]) -> Result<ColumnMapping, HistoricalImportError> {
    let normalized: Vec<String> = headers
        .iter()
        .map(|header| normalize_header(header))
        .collect();
    let mut taken: Vec<usize> = Vec::new();

    let mut find = |matches: fn(&str) -> bool| -> Option<ColumnRef> {
        let index = normalized
            .iter()
            .enumerate()
            .find(|(index, header)| !taken.contains(index) && matches(header))
            .map(|(index, _)| index)?;
        taken.push(index);
        Some(ColumnRef {
            index,
            header: headers[index]
                .trim_matches(|c: char| c.is_whitespace() || c == '\u{feff}')
                .to_string(),
        })
    };

    let surname = find(is_surname);
    let name = find(is_name);
    let period = find(is_period);
    let credits = find(is_credits);
    let description = find(is_description);

    match (name, surname, period, credits) {
        (Some(name), Some(surname), Some(period), Some(credits)) => Ok(ColumnMapping {
            name,
            surname,
            period,
            credits,
            description,
        }),
        (name, surname, period, credits) => {
            let missing = [
                ("name", name.is_none()),
                ("surname", surname.is_none()),
                ("year", period.is_none()),
                ("credits", credits.is_none()),
            ]
            .into_iter()
            .filter_map(|(column, absent)| absent.then_some(column))
            .collect();
            Err(HistoricalImportError::Schema { missing })
        }
    }
}
