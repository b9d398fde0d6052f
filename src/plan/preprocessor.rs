use super::error::{PlanError, Result};
use super::task::{Plan, Task};
use crate::inventory::{Inventory, VariableResolver};
use crate::modules::Module;
use crate::template::single_expression;
use crate::types::{
    is_henchman_var, is_reserved_var, is_valid_identifier, merge_vars, value_to_plain_string,
    VarsMap,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Deepest chain of task includes followed before giving up.
pub const MAX_INCLUDE_DEPTH: usize = 32;

const TASK_KEYS: &[&str] = &[
    "name",
    "action",
    "include",
    "when",
    "with_items",
    "register",
    "ignore_errors",
    "local",
    "sudo",
    "debug",
    "retry",
    "vars",
];

#[derive(Debug, Default, Deserialize)]
struct RawPlan {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    hosts: Option<Vec<String>>,
    #[serde(default)]
    sudo: Option<bool>,
    #[serde(default)]
    vars: Option<Map<String, Value>>,
    #[serde(default)]
    tasks: Option<Vec<Map<String, Value>>>,
}

/// What an included task list inherits from the entry that pulled it in.
#[derive(Debug, Clone, Default)]
struct Scope {
    vars: VarsMap,
    sudo: Option<bool>,
    when: String,
    depth: usize,
    base_dir: PathBuf,
}

/// Turns plan YAML into a flat [`Plan`].
#[derive(Debug, Clone)]
pub struct PlanPreprocessor {
    base_dir: PathBuf,
}

impl PlanPreprocessor {
    /// Includes are resolved relative to `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Read and preprocess a plan file; includes resolve next to it.
    pub fn load(path: &Path, inventory: &Inventory) -> Result<Plan> {
        let content = read(path)?;
        let base_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::new(base_dir).preprocess(&content, inventory)
    }

    pub fn preprocess(&self, content: &str, inventory: &Inventory) -> Result<Plan> {
        let raw = parse_raw(content, "<plan>")?;

        let mut vars = self.plan_vars(raw.vars.unwrap_or_default())?;
        let hosts = raw.hosts.unwrap_or_default();

        // Vars of the targeted groups are visible to every machine, below plan vars.
        if let Ok(selected) = inventory.for_groups(&hosts) {
            let group_vars = VariableResolver::new().group_vars(&selected);
            merge_vars(&mut vars, &group_vars, false);
        }

        let scope = Scope {
            sudo: raw.sudo,
            base_dir: self.base_dir.clone(),
            ..Scope::default()
        };
        let mut tasks = Vec::new();
        expand_tasks(raw.tasks.unwrap_or_default(), &scope, &mut tasks)?;

        let plan = Plan {
            name: raw.name.unwrap_or_default(),
            hosts,
            vars,
            tasks,
        };
        debug!(plan = %plan.name, tasks = plan.tasks.len(), "Preprocessed plan");
        Ok(plan)
    }

    /// Plan vars with any `include: [files]` entry expanded. Earlier
    /// definitions win over later ones.
    fn plan_vars(&self, mut raw: Map<String, Value>) -> Result<VarsMap> {
        let include = raw.remove("include");
        let mut vars: VarsMap = raw.into_iter().collect();

        let files = match include {
            None => return Ok(vars),
            Some(Value::Array(files)) => files,
            Some(other) => {
                return Err(PlanError::InvalidVarsInclude {
                    reason: format!("include must be a list of files, got {other}"),
                })
            }
        };

        for file in files {
            let file = match file {
                Value::String(file) => file,
                other => {
                    return Err(PlanError::InvalidVarsInclude {
                        reason: format!("include entry {other} is not a path"),
                    })
                }
            };
            let path = self.base_dir.join(&file);
            let included = parse_raw(&read(&path)?, &path.display().to_string())?;
            let included: VarsMap = included.vars.unwrap_or_default().into_iter().collect();
            merge_vars(&mut vars, &included, false);
        }

        Ok(vars)
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| PlanError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn parse_raw(content: &str, origin: &str) -> Result<RawPlan> {
    let raw: Option<RawPlan> =
        serde_yaml::from_str(content).map_err(|e| PlanError::InvalidYaml {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
    Ok(raw.unwrap_or_default())
}

fn expand_tasks(entries: Vec<Map<String, Value>>, scope: &Scope, out: &mut Vec<Task>) -> Result<()> {
    for entry in entries {
        if entry.contains_key("include") {
            expand_include(entry, scope, out)?;
        } else {
            out.push(build_task(entry, scope)?);
        }
    }
    Ok(())
}

fn expand_include(mut entry: Map<String, Value>, scope: &Scope, out: &mut Vec<Task>) -> Result<()> {
    let target = match entry.remove("include") {
        Some(Value::String(path)) => path,
        other => {
            return Err(PlanError::InvalidInclude {
                path: other.map(|v| v.to_string()).unwrap_or_default(),
                reason: "include must be a file path".to_string(),
            })
        }
    };
    let path = scope.base_dir.join(&target);
    let label = path.display().to_string();

    if entry.contains_key("action") || entry.keys().any(|k| !TASK_KEYS.contains(&k.as_str())) {
        return Err(PlanError::InvalidInclude {
            path: label,
            reason: "an include cannot also name a module".to_string(),
        });
    }

    let depth = scope.depth + 1;
    if depth > MAX_INCLUDE_DEPTH {
        return Err(PlanError::IncludeDepthExceeded {
            path: label,
            max: MAX_INCLUDE_DEPTH,
        });
    }

    let raw = parse_raw(&read(&path)?, &label)?;

    // parent scope < included file vars < vars on the include entry
    let mut vars = scope.vars.clone();
    let file_vars: VarsMap = raw.vars.unwrap_or_default().into_iter().collect();
    merge_vars(&mut vars, &file_vars, true);
    let entry_vars = mapping_field(&entry, "vars", &label)?;
    merge_vars(&mut vars, &entry_vars, true);

    let when = combine_when(&scope.when, &when_field(&entry, &label)?);
    let sudo = bool_field(&entry, "sudo", &label)?.or(scope.sudo);

    let child = Scope {
        vars,
        sudo,
        when,
        depth,
        base_dir: path.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };
    debug!(include = %label, depth, "Expanding include");
    expand_tasks(raw.tasks.unwrap_or_default(), &child, out)
}

fn build_task(entry: Map<String, Value>, scope: &Scope) -> Result<Task> {
    let name = match entry.get("name") {
        None | Some(Value::Null) => String::new(),
        Some(value) => value_to_plain_string(value),
    };
    let label = if name.is_empty() {
        "<unnamed>".to_string()
    } else {
        name.clone()
    };
    let module = module_for(&entry, &label)?;

    let mut task = Task::new(name, module);
    task.when = combine_when(&scope.when, &when_field(&entry, &label)?);
    task.with_items = entry.get("with_items").filter(|v| !v.is_null()).cloned();
    task.register = match entry.get("register") {
        None | Some(Value::Null) => None,
        Some(Value::String(register)) => Some(register_target(register, &label)?),
        Some(other) => {
            return Err(PlanError::InvalidTask {
                task: label,
                reason: format!("register target {other} is not a valid variable name"),
            })
        }
    };
    task.ignore_errors = bool_field(&entry, "ignore_errors", &label)?.unwrap_or(false);
    task.local = bool_field(&entry, "local", &label)?.unwrap_or(false);
    task.debug = bool_field(&entry, "debug", &label)?.unwrap_or(false);
    task.sudo = bool_field(&entry, "sudo", &label)?
        .or(scope.sudo)
        .unwrap_or(false);
    task.retry = retry_field(&entry, &label)?;

    let mut vars = scope.vars.clone();
    merge_vars(&mut vars, &mapping_field(&entry, "vars", &label)?, true);
    task.vars = vars;

    Ok(task)
}

/// The module comes from `action: "name k=v"` or from the single key that is
/// not a task keyword.
/// Registered results land in every later rendering context, so the name
/// follows the same rules as a var.
fn register_target(name: &str, label: &str) -> Result<String> {
    let reason = if is_henchman_var(name) {
        "henchman_ names are transport settings"
    } else if is_reserved_var(name) {
        "the name is a reserved keyword"
    } else if !is_valid_identifier(name) {
        "not a valid variable name"
    } else {
        return Ok(name.to_string());
    };

    Err(PlanError::InvalidRegister {
        task: label.to_string(),
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

fn module_for(entry: &Map<String, Value>, label: &str) -> Result<Module> {
    let module_keys: Vec<&String> = entry
        .keys()
        .filter(|k| !TASK_KEYS.contains(&k.as_str()))
        .collect();

    let invalid = |reason: String| PlanError::InvalidTask {
        task: label.to_string(),
        reason,
    };
    let module_error = |source| PlanError::Module {
        task: label.to_string(),
        source,
    };

    match (entry.get("action"), module_keys.as_slice()) {
        (Some(Value::String(action)), []) => Module::from_action(action).map_err(module_error),
        (Some(_), []) => Err(invalid("action must be a string".to_string())),
        (Some(_), _) => Err(invalid("action cannot be combined with a module key".to_string())),
        (None, [name]) => {
            let args = match &entry[name.as_str()] {
                Value::Null => String::new(),
                Value::String(args) => args.clone(),
                other => {
                    return Err(invalid(format!(
                        "arguments for module {name} must be a string, got {other}"
                    )))
                }
            };
            Module::new(name, &args).map_err(module_error)
        }
        (None, []) => Err(invalid("no module specified".to_string())),
        (None, names) => Err(invalid(format!(
            "more than one module specified: {}",
            names
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

/// Join two `when` predicates so both must hold.
fn combine_when(outer: &str, inner: &str) -> String {
    match (outer.trim(), inner.trim()) {
        ("", inner) => inner.to_string(),
        (outer, "") => outer.to_string(),
        (outer, inner) => {
            let outer = single_expression(outer).unwrap_or(outer);
            let inner = single_expression(inner).unwrap_or(inner);
            format!("{{{{ ({outer}) and ({inner}) }}}}")
        }
    }
}

fn when_field(entry: &Map<String, Value>, label: &str) -> Result<String> {
    match entry.get("when") {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(when)) => Ok(when.clone()),
        Some(Value::Bool(true)) => Ok("True".to_string()),
        Some(Value::Bool(false)) => Ok("False".to_string()),
        Some(other) => Err(PlanError::InvalidTask {
            task: label.to_string(),
            reason: format!("when must be a string, got {other}"),
        }),
    }
}

fn bool_field(entry: &Map<String, Value>, key: &str, label: &str) -> Result<Option<bool>> {
    match entry.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => match s.as_str() {
            "true" | "True" | "yes" | "Yes" => Ok(Some(true)),
            "false" | "False" | "no" | "No" => Ok(Some(false)),
            _ => Err(PlanError::InvalidTask {
                task: label.to_string(),
                reason: format!("{key} must be a boolean, got '{s}'"),
            }),
        },
        Some(other) => Err(PlanError::InvalidTask {
            task: label.to_string(),
            reason: format!("{key} must be a boolean, got {other}"),
        }),
    }
}

fn retry_field(entry: &Map<String, Value>, label: &str) -> Result<u32> {
    let invalid = |value: &Value| PlanError::InvalidTask {
        task: label.to_string(),
        reason: format!("retry must be a non-negative integer, got {value}"),
    };
    match entry.get("retry") {
        None | Some(Value::Null) => Ok(0),
        Some(value @ Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| invalid(value)),
        Some(value @ Value::String(s)) => s.trim().parse().map_err(|_| invalid(value)),
        Some(other) => Err(invalid(other)),
    }
}

fn mapping_field(entry: &Map<String, Value>, key: &str, label: &str) -> Result<VarsMap> {
    match entry.get(key) {
        None | Some(Value::Null) => Ok(VarsMap::new()),
        Some(Value::Object(map)) => Ok(map.clone().into_iter().collect()),
        Some(other) => Err(PlanError::InvalidTask {
            task: label.to_string(),
            reason: format!("{key} must be a mapping, got {other}"),
        }),
    }
}
