//! Lookup clause compiler.
//!
//! Maps one (lookup kind, field path, value) triple to one query clause.
//! Every function here is pure.

use serde_json::{Map, Value, json};

use super::nested;
use crate::error::ValidationError;
use crate::types::{Clause, LookupKind, LookupRequest, RangeBound};

/// Resolves a lookup name. `None` means no lookup was given and falls back
/// to `term`; an unrecognized name is an error.
pub fn resolve_lookup(field: &str, name: Option<&str>) -> Result<LookupKind, ValidationError> {
    match name {
        None => Ok(LookupKind::Term),
        Some(name) => name
            .parse::<LookupKind>()
            .map_err(|_| ValidationError::UnknownLookup {
                field: field.to_string(),
                lookup: name.to_string(),
            }),
    }
}

/// Compiles a resolved request, wrapping it in its nested scopes.
pub fn compile_request(request: &LookupRequest, separator: &str) -> Result<Clause, ValidationError> {
    let clause = compile(
        request.effective_lookup(),
        &request.field_path,
        &request.value,
        separator,
    )?;
    Ok(nested::wrap_scopes(clause, &request.nested_scopes))
}

/// Compiles one lookup on `field` into a clause.
///
/// String-encoded multi-values are split on `separator`.
pub fn compile(
    kind: LookupKind,
    field: &str,
    value: &Value,
    separator: &str,
) -> Result<Clause, ValidationError> {
    let ctx = Ctx {
        kind,
        field,
        separator,
    };

    let body = match kind {
        LookupKind::Term => json!({ "term": { field: ctx.scalar(value)? } }),
        LookupKind::Terms => json!({ "terms": { field: ctx.values(value)? } }),
        LookupKind::Range => ctx.range(value)?,
        LookupKind::Exists => exists(field, ctx.boolean(value)?),
        LookupKind::IsNull => exists(field, !ctx.boolean(value)?),
        LookupKind::Prefix | LookupKind::StartsWith => {
            json!({ "prefix": { field: ctx.scalar(value)? } })
        }
        LookupKind::Wildcard => json!({ "wildcard": { field: ctx.text(value)? } }),
        LookupKind::Contains => {
            json!({ "wildcard": { field: format!("*{}*", ctx.text(value)?) } })
        }
        LookupKind::EndsWith => json!({ "wildcard": { field: format!("*{}", ctx.text(value)?) } }),
        LookupKind::In => {
            let should: Vec<Value> = ctx
                .values(value)?
                .into_iter()
                .map(|v| json!({ "term": { field: v } }))
                .collect();
            json!({ "bool": { "should": should, "minimum_should_match": 1 } })
        }
        LookupKind::Exclude => {
            let must: Vec<Value> = ctx
                .values(value)?
                .into_iter()
                .map(|v| json!({ "bool": { "must_not": [{ "term": { field: v } }] } }))
                .collect();
            json!({ "bool": { "must": must } })
        }
        LookupKind::Gt | LookupKind::Gte | LookupKind::Lt | LookupKind::Lte => {
            ctx.single_bound(value)?
        }
        LookupKind::GeoDistance => ctx.geo_distance(value)?,
        LookupKind::GeoPolygon => ctx.geo_polygon(value)?,
        LookupKind::GeoBoundingBox => ctx.geo_bounding_box(value)?,
    };

    Ok(Clause::new(body, kind.occur()))
}

fn exists(field: &str, present: bool) -> Value {
    let clause = json!({ "exists": { "field": field } });
    if present {
        clause
    } else {
        json!({ "bool": { "must_not": [clause] } })
    }
}

struct Ctx<'a> {
    kind: LookupKind,
    field: &'a str,
    separator: &'a str,
}

impl Ctx<'_> {
    fn invalid(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::InvalidValue {
            field: self.field.to_string(),
            lookup: self.kind.to_string(),
            message: message.into(),
        }
    }

    fn scalar(&self, value: &Value) -> Result<Value, ValidationError> {
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(value.clone()),
            _ => Err(self.invalid("expected a single value")),
        }
    }

    fn text(&self, value: &Value) -> Result<String, ValidationError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(self.invalid("expected a string")),
        }
    }

    fn boolean(&self, value: &Value) -> Result<bool, ValidationError> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            _ => Err(self.invalid("expected a boolean")),
        }
    }

    fn split<'v>(&self, raw: &'v str) -> Vec<&'v str> {
        raw.split(self.separator).collect()
    }

    /// Flattens a list or a separator-encoded string into scalar values.
    fn values(&self, value: &Value) -> Result<Vec<Value>, ValidationError> {
        let values: Vec<Value> = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| self.scalar(item))
                .collect::<Result<_, _>>()?,
            Value::String(s) => self
                .split(s)
                .into_iter()
                .filter(|part| !part.is_empty())
                .map(|part| json!(part))
                .collect(),
            Value::Number(_) | Value::Bool(_) => vec![value.clone()],
            _ => return Err(self.invalid("expected a list of values")),
        };
        if values.is_empty() {
            return Err(self.invalid("expected at least one value"));
        }
        Ok(values)
    }

    fn bound(&self, value: &Value) -> Result<Value, ValidationError> {
        RangeBound::from_value(value)
            .map(|bound| bound.to_json())
            .ok_or_else(|| self.invalid("expected a number, date or string bound"))
    }

    fn boost(&self, value: Option<&Value>) -> Result<Option<f64>, ValidationError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => s
                .parse::<f64>()
                .map(Some)
                .map_err(|_| self.invalid(format!("invalid boost `{s}`"))),
            Some(_) => Err(self.invalid("boost must be a number")),
        }
    }

    fn range(&self, value: &Value) -> Result<Value, ValidationError> {
        let (lower, upper, boost) = match value {
            Value::Object(map) => (
                map.get("lower").filter(|v| !v.is_null()).cloned(),
                map.get("upper").filter(|v| !v.is_null()).cloned(),
                self.boost(map.get("boost"))?,
            ),
            Value::String(s) => {
                let parts = self.split(s);
                let part = |i: usize| {
                    parts
                        .get(i)
                        .filter(|p| !p.is_empty())
                        .map(|p| json!(p))
                };
                (part(0), part(1), self.boost(part(2).as_ref())?)
            }
            _ => return Err(self.invalid("expected {lower, upper, boost}")),
        };

        let lower = lower.ok_or_else(|| self.invalid("`lower` is required"))?;
        let mut params = Map::new();
        params.insert("gte".to_string(), self.bound(&lower)?);
        if let Some(upper) = upper {
            params.insert("lte".to_string(), self.bound(&upper)?);
        }
        if let Some(boost) = boost {
            params.insert("boost".to_string(), json!(boost));
        }
        Ok(json!({ "range": { self.field: params } }))
    }

    fn single_bound(&self, value: &Value) -> Result<Value, ValidationError> {
        let (bound, boost) = match value {
            Value::Object(map) => (
                map.get("value")
                    .cloned()
                    .ok_or_else(|| self.invalid("`value` is required"))?,
                self.boost(map.get("boost"))?,
            ),
            Value::String(s) if s.contains(self.separator) => {
                let parts = self.split(s);
                (json!(parts[0]), self.boost(parts.get(1).map(|p| json!(p)).as_ref())?)
            }
            other => (other.clone(), None),
        };

        let mut params = Map::new();
        params.insert(self.kind.to_string(), self.bound(&bound)?);
        if let Some(boost) = boost {
            params.insert("boost".to_string(), json!(boost));
        }
        Ok(json!({ "range": { self.field: params } }))
    }

    fn point(&self, value: &Value) -> Result<Value, ValidationError> {
        let coordinate = |v: Option<&Value>| -> Result<f64, ValidationError> {
            match v {
                Some(Value::Number(n)) => n.as_f64().ok_or_else(|| self.invalid("invalid coordinate")),
                Some(Value::String(s)) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| self.invalid(format!("invalid coordinate `{s}`"))),
                _ => Err(self.invalid("expected lat and lon")),
            }
        };

        match value {
            Value::Object(map) => Ok(json!({
                "lat": coordinate(map.get("lat"))?,
                "lon": coordinate(map.get("lon"))?,
            })),
            Value::String(s) => {
                let mut parts = s.split(',').map(|p| json!(p));
                let lat = parts.next();
                let lon = parts.next();
                Ok(json!({
                    "lat": coordinate(lat.as_ref())?,
                    "lon": coordinate(lon.as_ref())?,
                }))
            }
            _ => Err(self.invalid("expected a point")),
        }
    }

    fn with_boost(&self, mut clause: Value, map: Option<&Map<String, Value>>) -> Result<Value, ValidationError> {
        if let Some(boost) = self.boost(map.and_then(|m| m.get("boost")))? {
            if let Some(inner) = clause.as_object_mut().and_then(|c| c.values_mut().next()) {
                inner["boost"] = json!(boost);
            }
        }
        Ok(clause)
    }

    fn geo_distance(&self, value: &Value) -> Result<Value, ValidationError> {
        let mut params = Map::new();
        match value {
            Value::Object(map) => {
                let distance = map
                    .get("distance")
                    .ok_or_else(|| self.invalid("`distance` is required"))?;
                params.insert("distance".to_string(), distance.clone());
                params.insert(self.field.to_string(), self.point(value)?);
                if let Some(distance_type) = map.get("distance_type") {
                    params.insert("distance_type".to_string(), distance_type.clone());
                }
                self.with_boost(json!({ "geo_distance": params }), Some(map))
            }
            Value::String(s) => {
                // distance__lat__lon[__distance_type]
                let parts = self.split(s);
                if parts.len() < 3 {
                    return Err(self.invalid("expected distance, lat and lon"));
                }
                params.insert("distance".to_string(), json!(parts[0]));
                params.insert(
                    self.field.to_string(),
                    self.point(&json!({ "lat": parts[1], "lon": parts[2] }))?,
                );
                if let Some(distance_type) = parts.get(3) {
                    params.insert("distance_type".to_string(), json!(distance_type));
                }
                Ok(json!({ "geo_distance": params }))
            }
            _ => Err(self.invalid("expected {distance, lat, lon}")),
        }
    }

    fn geo_polygon(&self, value: &Value) -> Result<Value, ValidationError> {
        let (points, map) = match value {
            Value::Object(map) => (
                map.get("points")
                    .and_then(|p| p.as_array())
                    .cloned()
                    .ok_or_else(|| self.invalid("`points` is required"))?,
                Some(map),
            ),
            Value::String(s) => (self.split(s).into_iter().map(|p| json!(p)).collect(), None),
            _ => return Err(self.invalid("expected {points}")),
        };
        if points.len() < 3 {
            return Err(self.invalid("a polygon needs at least three points"));
        }
        let points = points
            .iter()
            .map(|p| self.point(p))
            .collect::<Result<Vec<_>, _>>()?;
        self.with_boost(
            json!({ "geo_polygon": { self.field: { "points": points } } }),
            map,
        )
    }

    fn geo_bounding_box(&self, value: &Value) -> Result<Value, ValidationError> {
        let (top_left, bottom_right, map) = match value {
            Value::Object(map) => (
                map.get("top_left")
                    .ok_or_else(|| self.invalid("`top_left` is required"))?
                    .clone(),
                map.get("bottom_right")
                    .ok_or_else(|| self.invalid("`bottom_right` is required"))?
                    .clone(),
                Some(map),
            ),
            Value::String(s) => {
                let parts = self.split(s);
                if parts.len() != 2 {
                    return Err(self.invalid("expected top_left and bottom_right"));
                }
                (json!(parts[0]), json!(parts[1]), None)
            }
            _ => return Err(self.invalid("expected {top_left, bottom_right}")),
        };
        self.with_boost(
            json!({
                "geo_bounding_box": {
                    self.field: {
                        "top_left": self.point(&top_left)?,
                        "bottom_right": self.point(&bottom_right)?,
                    }
                }
            }),
            map,
        )
    }
}
