use crate::config::{self, Config};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::roster::ImportRules;
use serde_json::{json, Map, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Import,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "import" => Some(Self::Import),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Import => "setup.import",
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Import => "import",
        }
    }
}

fn default_section(section: SetupSection, config: &Config) -> Value {
    match section {
        SetupSection::Import => json!({
            "studentIdPrefix": config.student_id_prefix,
            "studentIdDigits": config.student_id_digits
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Import => match k.as_str() {
                "studentIdPrefix" => {
                    let s = v
                        .as_str()
                        .ok_or_else(|| format!("{} must be string", k))?
                        .trim();
                    config::validate_prefix(s)?;
                    obj.insert(k.clone(), Value::String(s.to_string()));
                }
                "studentIdDigits" => {
                    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", k))?;
                    config::validate_digits(n)?;
                    obj.insert(k.clone(), Value::from(n));
                }
                _ => return Err(format!("unknown import field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(
    conn: &rusqlite::Connection,
    config: &Config,
    section: SetupSection,
) -> anyhow::Result<Value> {
    let mut current = default_section(section, config);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // A saved section that no longer validates is ignored as a whole.
            let mut merged = current.clone();
            match merge_section_patch(section, &mut merged, saved_obj) {
                Ok(()) => current = merged,
                Err(msg) => tracing::warn!(
                    section = section.name(),
                    error = %msg,
                    "ignoring invalid saved setup section"
                ),
            }
        }
    }
    Ok(current)
}

/// Effective student-ID rule: process config overlaid with `setup.import`.
pub fn load_import_rules(state: &AppState) -> anyhow::Result<ImportRules> {
    let section = load_section(&state.db, &state.config, SetupSection::Import)?;
    let prefix = section
        .get("studentIdPrefix")
        .and_then(|v| v.as_str())
        .unwrap_or(&state.config.student_id_prefix);
    let digits = section
        .get("studentIdDigits")
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(state.config.student_id_digits);
    Ok(ImportRules::new(prefix, digits)?)
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let section = match req.params.get("section").and_then(|v| v.as_str()) {
        None => SetupSection::Import,
        Some(raw) => match SetupSection::parse(raw) {
            Some(s) => s,
            None => return err(&req.id, "bad_params", "unknown section", None),
        },
    };
    match load_section(&state.db, &state.config, section) {
        Ok(v) => ok(&req.id, json!({ section.name(): v })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(&state.db, &state.config, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(&state.db, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(section = section.name(), "setup updated");
    ok(&req.id, json!({ section.name(): current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
