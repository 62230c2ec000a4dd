use serde::{Deserialize, Deserializer};
use std::io::Read;

/// One workflow step as exported by the workflow builder.
#[derive(Debug, Deserialize)]
pub(crate) struct CatalogRow {
    #[serde(rename = "Step Id")]
    pub(crate) step_id: String,
    #[serde(rename = "Name")]
    pub(crate) name: String,
    #[serde(rename = "Required Role")]
    pub(crate) required_role: String,
    #[serde(rename = "Order", default, deserialize_with = "empty_string_as_none")]
    pub(crate) order: Option<String>,
    #[serde(rename = "Exit Step", default, deserialize_with = "empty_string_as_none")]
    pub(crate) exit_step: Option<String>,
    #[serde(rename = "Depends On", default, deserialize_with = "empty_string_as_none")]
    pub(crate) depends_on: Option<String>,
    #[serde(rename = "Root", default, deserialize_with = "empty_string_as_none")]
    pub(crate) root: Option<String>,
}

impl CatalogRow {
    pub(crate) fn dependencies(&self) -> Vec<String> {
        self.depends_on
            .as_deref()
            .map(|raw| {
                raw.split(';')
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub(crate) fn parse_rows<R: Read>(reader: R) -> Result<Vec<CatalogRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let rows: Result<Vec<CatalogRow>, csv::Error> = csv_reader.deserialize().collect();
    rows
}

/// Parse the boolean spellings spreadsheet exports tend to produce.
pub(crate) fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value {
        None => Some(false),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
