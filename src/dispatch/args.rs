//! String-keyed argument maps with typed accessors
//!
//! Both front ends hand the router a JSON object. The CLI sends strings, the
//! tool server sends whatever the client put in `arguments`. Accessors accept
//! either form and fall back to the operation's default for the surface.
//! Every failure is an `InvalidParams` naming the argument.

use crate::dispatch::operations::{Operation, Surface};
use crate::error::{HealthError, HealthResult};
use crate::health::dates::{parse_instant_at, parse_range_at};
use crate::health::registry::registry;
use crate::health::types::{DataType, TimeInterval};
use crate::health::units::{self, UnitDescriptor};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde_json::Value;

/// Generic argument map as produced by either front end
pub type ArgMap = serde_json::Map<String, Value>;

/// Arguments of one request, bound to its operation and surface
pub struct Args<'a> {
    op: &'static Operation,
    surface: Surface,
    raw: &'a ArgMap,
    now: DateTime<Local>,
}

impl<'a> Args<'a> {
    /// Bind `raw` to `op`; every date in the request is resolved against `now`
    pub fn new(
        op: &'static Operation,
        surface: Surface,
        raw: &'a ArgMap,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            op,
            surface,
            raw,
            now,
        }
    }

    /// First required argument that is absent or null
    pub fn missing_required(&self) -> Option<&'static str> {
        self.op
            .required
            .iter()
            .copied()
            .find(|name| self.supplied(name).is_none())
    }

    fn supplied(&self, name: &str) -> Option<&'a Value> {
        self.raw.get(name).filter(|v| !v.is_null())
    }

    fn default(&self, name: &str) -> Option<&'static str> {
        self.op
            .optional_arg(name)
            .and_then(|spec| spec.default_for(self.surface))
    }

    /// Argument as text, falling back to the surface default
    pub fn string(&self, name: &str) -> HealthResult<Option<String>> {
        match self.supplied(name) {
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(HealthError::invalid(name, "expected a string")),
            None => Ok(self.default(name).map(str::to_string)),
        }
    }

    pub fn required_string(&self, name: &str) -> HealthResult<String> {
        self.string(name)?
            .ok_or_else(|| HealthError::invalid(name, "missing required argument"))
    }

    /// Finite number; numeric strings are accepted
    pub fn number(&self, name: &str) -> HealthResult<Option<f64>> {
        let value = match self.supplied(name) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
            None => match self.default(name) {
                Some(default) => default.parse::<f64>().ok(),
                None => return Ok(None),
            },
        };

        match value {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(HealthError::invalid(name, "expected a finite number")),
        }
    }

    /// Non-negative finite number
    pub fn amount(&self, name: &str) -> HealthResult<Option<f64>> {
        match self.number(name)? {
            Some(v) if v < 0.0 => Err(HealthError::invalid(name, "must not be negative")),
            other => Ok(other),
        }
    }

    /// Positive integer `limit`
    pub fn limit(&self) -> HealthResult<Option<usize>> {
        let invalid = || HealthError::invalid("limit", "expected a positive integer");
        let text = match self.supplied("limit") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(_) => return Err(invalid()),
            None => match self.default("limit") {
                Some(default) => default.to_string(),
                None => return Ok(None),
            },
        };

        match text.parse::<usize>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(limit) => Ok(Some(limit)),
        }
    }

    /// Boolean flag; `"true"`/`"false"` strings are accepted
    pub fn flag(&self, name: &str) -> HealthResult<bool> {
        let text = match self.supplied(name) {
            Some(Value::Bool(b)) => return Ok(*b),
            Some(Value::String(s)) => s.trim().to_lowercase(),
            Some(_) => return Err(HealthError::invalid(name, "expected true or false")),
            None => match self.default(name) {
                Some(default) => default.to_string(),
                None => return Ok(false),
            },
        };

        match text.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(HealthError::invalid(name, "expected true or false")),
        }
    }

    /// List of strings; a comma-separated string is split
    pub fn list(&self, name: &str) -> HealthResult<Vec<String>> {
        let items: Vec<String> = match self.supplied(name) {
            Some(Value::Array(values)) => values
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.clone()),
                    _ => Err(HealthError::invalid(name, "expected a list of strings")),
                })
                .collect::<HealthResult<_>>()?,
            Some(Value::String(s)) => s.split(',').map(str::to_string).collect(),
            Some(_) => return Err(HealthError::invalid(name, "expected a list of strings")),
            None => match self.default(name) {
                Some(default) => default.split(',').map(str::to_string).collect(),
                None => Vec::new(),
            },
        };

        Ok(items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect())
    }

    /// The `type` argument resolved through the registry
    pub fn data_type(&self) -> HealthResult<&'static DataType> {
        let id = self.required_string("type")?;
        resolve_type("type", &id)
    }

    /// The `unit` argument for `data_type`, or its default unit
    pub fn unit(&self, data_type: &DataType) -> HealthResult<UnitDescriptor> {
        let token = self.string("unit")?;
        units::resolve(token.as_deref(), data_type)
            .map_err(|e| HealthError::invalid("unit", e.to_string()))
    }

    /// A date expression resolved to an instant
    pub fn instant(&self, name: &str) -> HealthResult<Option<DateTime<Utc>>> {
        match self.string(name)? {
            Some(text) => parse_instant_at(&text, self.now)
                .map(Some)
                .map_err(|e| HealthError::invalid(name, e.to_string())),
            None => Ok(None),
        }
    }

    pub fn required_instant(&self, name: &str) -> HealthResult<DateTime<Utc>> {
        self.instant(name)?
            .ok_or_else(|| HealthError::invalid(name, "missing required argument"))
    }

    /// The `from`/`to` window
    pub fn interval(&self) -> HealthResult<TimeInterval> {
        let from = self.string("from")?.unwrap_or_else(|| "7d".to_string());
        let to = self.string("to")?.unwrap_or_else(|| "now".to_string());
        parse_range_at(&from, &to, self.now)
            .map_err(|e| HealthError::invalid(e.side.as_str(), e.error.to_string()))
    }

    /// A date expression reduced to its local calendar day
    pub fn date(&self, name: &str) -> HealthResult<NaiveDate> {
        let instant = match self.instant(name)? {
            Some(instant) => instant,
            None => self.now.with_timezone(&Utc),
        };
        Ok(instant.with_timezone(&Local).date_naive())
    }
}

/// Resolve a data type id, reporting failures against `field`
pub fn resolve_type(field: &str, id: &str) -> HealthResult<&'static DataType> {
    registry().resolve(id).ok_or_else(|| {
        HealthError::invalid(
            field,
            format!(
                "unknown data type '{}' (known: {})",
                id,
                registry().ids().join(", ")
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::operations::find;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, 14, 30, 0).unwrap()
    }

    fn map(value: Value) -> ArgMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_missing_required() {
        let op = find("health_write_quantity").unwrap();
        let raw = map(json!({"type": "weight", "value": null}));
        let args = Args::new(op, Surface::Protocol, &raw, now());
        assert_eq!(args.missing_required(), Some("value"));

        let raw = map(json!({"type": "weight", "value": 75.5}));
        let args = Args::new(op, Surface::Protocol, &raw, now());
        assert_eq!(args.missing_required(), None);
    }

    #[test]
    fn test_coercions() {
        let op = find("health_authorize").unwrap();
        let raw = map(json!({"types": "steps, weight,", "read_only": "TRUE"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert_eq!(args.list("types").unwrap(), vec!["steps", "weight"]);
        assert!(args.flag("read_only").unwrap());

        let raw = map(json!({"types": ["heart_rate"], "read_only": false}));
        let args = Args::new(op, Surface::Protocol, &raw, now());
        assert_eq!(args.list("types").unwrap(), vec!["heart_rate"]);
        assert!(!args.flag("read_only").unwrap());

        let raw = map(json!({"read_only": "maybe"}));
        let args = Args::new(op, Surface::Protocol, &raw, now());
        assert_eq!(args.flag("read_only").unwrap_err().field(), Some("read_only"));
    }

    #[test]
    fn test_numbers_and_limits() {
        let op = find("health_read_quantity").unwrap();

        let raw = map(json!({"type": "weight", "limit": "25"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert_eq!(args.limit().unwrap(), Some(25));

        let raw = map(json!({"type": "weight"}));
        let args = Args::new(op, Surface::Protocol, &raw, now());
        assert_eq!(args.limit().unwrap(), Some(100));

        for bad in [json!(0), json!(-3), json!("ten"), json!(2.5)] {
            let raw = map(json!({"type": "weight", "limit": bad}));
            let args = Args::new(op, Surface::Protocol, &raw, now());
            assert_eq!(args.limit().unwrap_err().field(), Some("limit"));
        }

        let op = find("health_write_quantity").unwrap();
        let raw = map(json!({"type": "weight", "value": "75.5"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert_eq!(args.amount("value").unwrap(), Some(75.5));

        let raw = map(json!({"type": "weight", "value": "-1"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert!(args.amount("value").is_err());

        let raw = map(json!({"type": "weight", "value": "NaN"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert!(args.number("value").is_err());
    }

    #[test]
    fn test_interval_defaults_by_surface() {
        let op = find("health_read_steps").unwrap();
        let raw = ArgMap::new();

        let cli = Args::new(op, Surface::Cli, &raw, now()).interval().unwrap();
        assert_eq!(cli.duration(), Duration::days(1));

        let protocol = Args::new(op, Surface::Protocol, &raw, now()).interval().unwrap();
        assert_eq!(protocol.duration(), Duration::days(7));
        assert_eq!(protocol.end, now().with_timezone(&Utc));
    }

    #[test]
    fn test_interval_error_names_side() {
        let op = find("health_read_steps").unwrap();
        let raw = map(json!({"from": "last tuesday"}));
        let err = Args::new(op, Surface::Cli, &raw, now()).interval().unwrap_err();
        assert_eq!(err.field(), Some("from"));

        let raw = map(json!({"to": "9q"}));
        let err = Args::new(op, Surface::Cli, &raw, now()).interval().unwrap_err();
        assert_eq!(err.field(), Some("to"));
    }

    #[test]
    fn test_type_and_unit() {
        let op = find("health_read_quantity").unwrap();

        let raw = map(json!({"type": "weight", "unit": "LBS"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        let weight = args.data_type().unwrap();
        assert_eq!(args.unit(weight).unwrap(), units::POUND);

        let raw = map(json!({"type": "weight", "unit": "mmHg"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert_eq!(args.unit(weight).unwrap_err().field(), Some("unit"));

        let raw = map(json!({"type": "Weight"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert_eq!(args.data_type().unwrap_err().field(), Some("type"));
    }

    #[test]
    fn test_date_defaults_to_today() {
        let op = find("health_read_activity").unwrap();
        let raw = ArgMap::new();
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert_eq!(args.date("date").unwrap(), now().date_naive());

        let raw = map(json!({"date": "2024-02-29"}));
        let args = Args::new(op, Surface::Cli, &raw, now());
        assert_eq!(
            args.date("date").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }
}
