use crate::domain::reading::TankId;
use crate::domain::tank::TankGroup;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub sheets: SheetsSettings,
    pub auth: AuthSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetsSettings {
    pub spreadsheet_id: String,
    pub api_key: String,
    /// Range template, `${group}` is replaced by the group name
    pub range_template: String,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub scope: String,
    pub access_token: Option<String>,
    #[serde(default = "default_sign_in_timeout")]
    pub sign_in_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub listen: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GroupConfig {
    pub name: String,
    pub recent_window: usize,
    pub tanks: Vec<u32>,
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_sign_in_timeout() -> u64 {
    120
}

impl SheetsSettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl AuthSettings {
    pub fn sign_in_timeout(&self) -> Duration {
        Duration::from_secs(self.sign_in_timeout_secs)
    }
}

impl DashboardConfig {
    /// Tank groups with their named ranges filled in.
    pub fn tank_groups(&self) -> anyhow::Result<Vec<TankGroup>> {
        if self.groups.is_empty() {
            anyhow::bail!("no tank groups configured");
        }

        let mut seen = Vec::new();
        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            if group.tanks.is_empty() {
                anyhow::bail!("tank group {} has no tanks", group.name);
            }
            for tank in &group.tanks {
                if seen.contains(tank) {
                    anyhow::bail!("tank {} is configured in more than one group", tank);
                }
                seen.push(*tank);
            }

            let mut vars = HashMap::new();
            vars.insert("group".to_string(), group.name.clone());
            groups.push(TankGroup::new(
                group.name.clone(),
                prepare_range(&self.sheets.range_template, &vars),
                group.recent_window,
                group.tanks.iter().copied().map(TankId).collect(),
            ));
        }

        Ok(groups)
    }
}

/// `config/dashboard.toml`, overridable with `TANKS__SECTION__KEY` variables.
pub fn load_dashboard_config() -> anyhow::Result<DashboardConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/dashboard"))
        .add_source(config::Environment::with_prefix("TANKS").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Replace template variables in a range string
pub fn prepare_range(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}
