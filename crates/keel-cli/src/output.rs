//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use keel_domain::{FieldId, FieldRegistry, FieldState, RecordId, Snapshot};
use keel_store::VersionSummary;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a list of record IDs.
    pub fn format_records(&self, records: &[RecordId]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let ids: Vec<String> = records.iter().map(|r| r.to_string()).collect();
                Ok(serde_json::to_string_pretty(&ids)?)
            }
            OutputFormat::Table | OutputFormat::Quiet if records.is_empty() => {
                Ok(self.colorize("No records found.", "yellow"))
            }
            OutputFormat::Table | OutputFormat::Quiet => Ok(records
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }

    /// Format a record's version history.
    pub fn format_history(&self, history: &[VersionSummary]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = history
                    .iter()
                    .map(|v| {
                        serde_json::json!({
                            "id": v.id.to_string(),
                            "version": v.version_number,
                            "created_at": v.created_at.to_rfc3339(),
                            "updated_at": v.updated_at.to_rfc3339(),
                            "current": v.is_current,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&entries)?)
            }
            OutputFormat::Quiet => Ok(history
                .iter()
                .map(|v| v.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if history.is_empty() {
                    return Ok(self.colorize("No versions found.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["#", "Version", "Created", "Updated", "Current"]);
                for v in history {
                    builder.push_record([
                        v.version_number.to_string(),
                        v.id.to_string(),
                        v.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        v.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                        if v.is_current { "*".to_string() } else { String::new() },
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format every field of a snapshot with its display state.
    pub fn format_fields(
        &self,
        snapshot: &Snapshot,
        registry: &FieldRegistry,
        touched_only: bool,
    ) -> Result<String> {
        let fields: Vec<&FieldId> = registry
            .fields()
            .map(|spec| &spec.id)
            .filter(|id| {
                !touched_only || snapshot.value(id).is_some() || snapshot.provenance(id).is_some()
            })
            .collect();

        match self.format {
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = fields
                    .iter()
                    .map(|id| {
                        serde_json::json!({
                            "field": id.as_str(),
                            "value": snapshot.value(id).map(|v| v.to_json()),
                            "source": snapshot.provenance(id).map(|p| p.source.to_string()),
                            "state": snapshot.classify(id).as_str(),
                            "locked": snapshot.is_locked(id),
                            "warnings": snapshot.warnings(id),
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&entries)?)
            }
            OutputFormat::Quiet => Ok(fields
                .iter()
                .map(|id| format!("{}\t{}", id, snapshot.classify(id).as_str()))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut builder = Builder::default();
                builder.push_record(["Field", "Value", "Source", "State", "Locked", "Warnings"]);
                for id in fields {
                    builder.push_record([
                        id.to_string(),
                        snapshot.value(id).map(|v| v.to_string()).unwrap_or_default(),
                        snapshot
                            .provenance(id)
                            .map(|p| p.source.to_string())
                            .unwrap_or_default(),
                        self.state_label(snapshot.classify(id)),
                        if snapshot.is_locked(id) { "yes".to_string() } else { String::new() },
                        snapshot.warnings(id).join("; "),
                    ]);
                }
                Ok(self.table(builder))
            }
        }
    }

    /// Format consistency issues per field.
    pub fn format_issues(&self, issues: &[(FieldId, Vec<String>)]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let entries: Vec<serde_json::Value> = issues
                    .iter()
                    .map(|(field, warnings)| {
                        serde_json::json!({ "field": field.as_str(), "warnings": warnings })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&entries)?)
            }
            OutputFormat::Quiet => Ok(issues
                .iter()
                .map(|(field, _)| field.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if issues.is_empty() {
                    return Ok(self.success("No consistency issues"));
                }
                Ok(issues
                    .iter()
                    .flat_map(|(field, warnings)| {
                        warnings
                            .iter()
                            .map(move |w| self.warning(&format!("{}: {}", field, w)))
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }

    /// Format the registry's fields and sections.
    pub fn format_registry(&self, registry: &FieldRegistry) -> Result<String> {
        if self.format == OutputFormat::Json {
            let fields: Vec<serde_json::Value> = registry
                .fields()
                .map(|spec| {
                    serde_json::json!({
                        "id": spec.id.as_str(),
                        "type": spec.data_type.as_str(),
                        "required": spec.required,
                        "dependents": registry.dependents(&spec.id),
                    })
                })
                .collect();
            return Ok(serde_json::to_string_pretty(&fields)?);
        }

        let mut builder = Builder::default();
        builder.push_record(["Field", "Type", "Required", "Section", "Dependents"]);
        for spec in registry.fields() {
            let section = registry
                .sections()
                .iter()
                .find(|s| s.fields.contains(&spec.id))
                .map(|s| s.id.clone())
                .unwrap_or_default();
            let dependents = registry
                .dependents(&spec.id)
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            builder.push_record([
                spec.id.to_string(),
                spec.data_type.as_str().to_string(),
                if spec.required { "yes".to_string() } else { String::new() },
                section,
                dependents,
            ]);
        }
        Ok(self.table(builder))
    }

    fn table(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colored label for a field state.
    pub fn state_label(&self, state: FieldState) -> String {
        let color = match state {
            FieldState::White => "white",
            FieldState::Blue => "blue",
            FieldState::Green => "green",
            FieldState::Red => "red",
        };
        self.colorize(state.as_str(), color)
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}
