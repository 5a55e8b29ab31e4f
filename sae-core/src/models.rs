use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Bounds for the number of buildings in a project
pub const BUILDINGS_COUNT_MIN: i64 = 1;
pub const BUILDINGS_COUNT_MAX: i64 = 50;

/// Bounds for the floors of a single building
pub const FLOORS_MIN: i64 = 1;
pub const FLOORS_MAX: i64 = 200;

/// Bounds for the approximate device count of a single building
pub const DEVICES_MIN: i64 = 0;
pub const DEVICES_MAX: i64 = 100_000;

/// Field values for newly appended buildings
pub const DEFAULT_FLOORS: u32 = 1;
pub const DEFAULT_APPROX_DEVICES: u32 = 50;

/// Integration keys known to the solution profile
pub const INTEGRATION_BMS: &str = "bms";
pub const INTEGRATION_ACCESS_CONTROL: &str = "accessControl";
pub const INTEGRATION_CCTV: &str = "cctv";

pub const INTEGRATION_KEYS: [&str; 3] = [
    INTEGRATION_BMS,
    INTEGRATION_ACCESS_CONTROL,
    INTEGRATION_CCTV,
];

/// Parses `raw` as a base-10 integer and clamps it into `[min, max]`.
///
/// Parsing is lenient: surrounding whitespace is ignored and only the leading
/// integer prefix is considered, so `"12abc"` is 12 and `"3.9"` is 3. Input
/// without an integer prefix yields `min`.
pub fn clamp_int(raw: &str, min: i64, max: i64) -> i64 {
    match parse_int_prefix(raw) {
        Some(n) => n.clamp(min, max),
        None => min,
    }
}

fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // Saturate instead of overflowing; the caller clamps anyway
    let mut value: i64 = 0;
    for b in digits[..end].bytes() {
        let digit = i64::from(b - b'0');
        value = value.saturating_mul(10).saturating_add(digit);
    }
    Some(if negative { -value } else { value })
}

/// Clamps an arbitrary JSON value with the same policy as [`clamp_int`]
fn clamp_value(value: &Value, min: i64, max: i64) -> i64 {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.clamp(min, max)
            } else if n.as_u64().is_some() {
                max
            } else {
                match n.as_f64() {
                    // `as` saturates and truncates toward zero
                    Some(f) if f.is_finite() => (f as i64).clamp(min, max),
                    _ => min,
                }
            }
        }
        Value::String(s) => clamp_int(s, min, max),
        _ => min,
    }
}

fn to_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn de_buildings_count<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(to_u32(clamp_value(
        &value,
        BUILDINGS_COUNT_MIN,
        BUILDINGS_COUNT_MAX,
    )))
}

fn de_floors<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(to_u32(clamp_value(&value, FLOORS_MIN, FLOORS_MAX)))
}

fn de_devices<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(to_u32(clamp_value(&value, DEVICES_MIN, DEVICES_MAX)))
}

/// Strings tolerate `null` (empty) and scalar values (rendered as text)
fn de_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn de_flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    Ok(flag_value(&Value::deserialize(d)?))
}

fn de_flags<'de, D: Deserializer<'de>>(d: D) -> Result<BTreeMap<String, bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| {
                let enabled = flag_value(&value);
                (key, enabled)
            })
            .collect(),
        _ => BTreeMap::new(),
    })
}

fn flag_value(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => parse_flag(s).unwrap_or(false),
        _ => false,
    }
}

/// Parses a user-supplied boolean (true/false, yes/no, on/off, 1/0)
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "y" | "on" | "1" => Some(true),
        "false" | "no" | "n" | "off" | "0" | "" => Some(false),
        _ => None,
    }
}

fn default_buildings_count() -> u32 {
    1
}

fn default_floors() -> u32 {
    DEFAULT_FLOORS
}

fn default_devices() -> u32 {
    DEFAULT_APPROX_DEVICES
}

/// Network connectivity chosen for the solution
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub enum Connectivity {
    #[default]
    #[serde(rename = "LAN")]
    Lan,
    #[serde(rename = "WAN")]
    Wan,
    #[serde(rename = "VPN")]
    Vpn,
}

impl Connectivity {
    pub const ALL: [Connectivity; 3] = [Connectivity::Lan, Connectivity::Wan, Connectivity::Vpn];

    /// Label shown in selection lists
    pub fn label(&self) -> &'static str {
        match self {
            Connectivity::Lan => "LAN (On-prem)",
            Connectivity::Wan => "WAN (Multi-site)",
            Connectivity::Vpn => "VPN / Secure Tunnel",
        }
    }
}

impl fmt::Display for Connectivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connectivity::Lan => write!(f, "LAN"),
            Connectivity::Wan => write!(f, "WAN"),
            Connectivity::Vpn => write!(f, "VPN"),
        }
    }
}

impl FromStr for Connectivity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LAN" => Ok(Connectivity::Lan),
            "WAN" => Ok(Connectivity::Wan),
            "VPN" => Ok(Connectivity::Vpn),
            other => Err(format!("unknown connectivity '{}' (expected LAN, WAN or VPN)", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Connectivity {
    /// Unknown or missing values fall back to LAN
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s.parse().unwrap_or_default(),
            _ => Connectivity::default(),
        })
    }
}

/// Identity and sizing of the project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    #[serde(default, deserialize_with = "de_text")]
    pub systems_integrator_id: String,

    /// Generated once per document, never regenerated once present
    #[serde(default, deserialize_with = "de_text")]
    pub project_auto_id: String,

    #[serde(default, deserialize_with = "de_text")]
    pub project_name: String,

    /// Source of truth for how many buildings exist
    #[serde(
        default = "default_buildings_count",
        deserialize_with = "de_buildings_count"
    )]
    pub buildings_count: u32,
}

/// One building's metadata; identity is its position in the list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BuildingEntry {
    #[serde(default, deserialize_with = "de_text")]
    pub name: String,

    #[serde(default = "default_floors", deserialize_with = "de_floors")]
    pub floors: u32,

    #[serde(default = "default_devices", deserialize_with = "de_devices")]
    pub approx_devices: u32,
}

impl BuildingEntry {
    /// Default entry for the building at `index` (0-based)
    pub fn default_at(index: usize) -> Self {
        Self {
            name: format!("Building {}", index + 1),
            floors: DEFAULT_FLOORS,
            approx_devices: DEFAULT_APPROX_DEVICES,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildingSection {
    #[serde(default)]
    pub items: Vec<BuildingEntry>,
}

/// Solution profile selected on the last wizard screen
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SolutionProfile {
    #[serde(default)]
    pub connectivity: Connectivity,

    #[serde(default, deserialize_with = "de_flag")]
    pub includes_cloud: bool,

    /// Integration key -> enabled. Unknown keys are kept as-is.
    #[serde(default, deserialize_with = "de_flags")]
    pub integrations: BTreeMap<String, bool>,
}

impl Default for SolutionProfile {
    fn default() -> Self {
        let integrations = [
            (INTEGRATION_BMS, true),
            (INTEGRATION_ACCESS_CONTROL, false),
            (INTEGRATION_CCTV, false),
        ]
        .into_iter()
        .map(|(key, enabled)| (key.to_string(), enabled))
        .collect();

        Self {
            connectivity: Connectivity::Lan,
            includes_cloud: false,
            integrations,
        }
    }
}

impl SolutionProfile {
    /// Whether an integration is enabled; absent keys read as disabled
    pub fn integration(&self, key: &str) -> bool {
        self.integrations.get(key).copied().unwrap_or(false)
    }
}

/// The single persisted record of the wizard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectDocument {
    pub project: ProjectInfo,
    pub building: BuildingSection,
    pub solution: SolutionProfile,
}

impl Default for ProjectDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectDocument {
    /// Creates a fresh document with a new auto id and one default building
    pub fn new() -> Self {
        Self {
            project: ProjectInfo {
                systems_integrator_id: String::new(),
                project_auto_id: generate_auto_id(),
                project_name: String::new(),
                buildings_count: 1,
            },
            building: BuildingSection {
                items: vec![BuildingEntry::default_at(0)],
            },
            solution: SolutionProfile::default(),
        }
    }

    /// Clamps `buildings_count` and resizes `building.items` to match.
    ///
    /// New entries are appended with defaults; surplus entries are dropped
    /// from the tail. Existing entries are never reordered.
    pub fn reconcile_buildings(&mut self) {
        let count = i64::from(self.project.buildings_count)
            .clamp(BUILDINGS_COUNT_MIN, BUILDINGS_COUNT_MAX);
        let count = usize::try_from(count).unwrap_or(1);
        self.project.buildings_count = to_u32(count as i64);

        let items = &mut self.building.items;
        if items.len() < count {
            let start = items.len();
            items.extend((start..count).map(BuildingEntry::default_at));
        } else {
            items.truncate(count);
        }
    }

    /// Assigns an auto id if the document has none. Returns true if one was assigned.
    pub fn ensure_auto_id(&mut self) -> bool {
        if self.project.project_auto_id.trim().is_empty() {
            self.project.project_auto_id = generate_auto_id();
            true
        } else {
            false
        }
    }

    /// Computes building totals from the current entries
    pub fn summary(&self) -> Summary {
        let items = &self.building.items;
        Summary {
            buildings: items.len(),
            total_floors: items.iter().map(|b| u64::from(b.floors)).sum(),
            total_devices: items.iter().map(|b| u64::from(b.approx_devices)).sum(),
        }
    }
}

/// Generates a new project auto id
pub fn generate_auto_id() -> String {
    Uuid::new_v4().to_string()
}

/// Derived building totals; never stored
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub buildings: usize,
    pub total_floors: u64,
    pub total_devices: u64,
}

/// Editable field of a [`BuildingEntry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildingField {
    Name,
    Floors,
    ApproxDevices,
}

impl fmt::Display for BuildingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildingField::Name => write!(f, "name"),
            BuildingField::Floors => write!(f, "floors"),
            BuildingField::ApproxDevices => write!(f, "approxDevices"),
        }
    }
}

impl FromStr for BuildingField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-'], "").as_str() {
            "name" => Ok(BuildingField::Name),
            "floors" => Ok(BuildingField::Floors),
            "approxdevices" | "devices" => Ok(BuildingField::ApproxDevices),
            _ => Err(format!(
                "unknown building field '{}' (expected name, floors or approxDevices)",
                s
            )),
        }
    }
}
