//! Versioned, named collection of [`Parameter`]s with a binary round-trip
//! (§4.1, §6). Grounded on `original_source/include/nano/configurable.h`'s
//! `configurable_t` (`register_parameter`, `parameter()`, `parameters()`,
//! `major_version()`/`minor_version()`/`patch_version()`) and reimplemented
//! as ordinary Rust rather than the teacher's compile-time
//! `build_options!`/`use_option!` proc macros, since the domain-validated
//! runtime `set`/`get` and the versioned binary format have no compile-time
//! equivalent in the teacher's registry.

use std::collections::HashMap;

use problemo::Problem;
use problemo::ProblemResult;

use crate::core::error::ParameterError;
use crate::core::parameter::{ParamValue, Parameter};

/// A `(major, minor, patch)` triple, persisted at the head of the binary
/// format. Reading a stream whose major component exceeds this library's is
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl Version {
    pub const fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self { major, minor, patch }
    }
}

/// Tag byte identifying a [`ParamValue`] variant in the binary format.
const TAG_INT: u8 = 0;
const TAG_FLOAT: u8 = 1;
const TAG_ENUM: u8 = 2;

/// Versioned owner of a named, ordered collection of parameters.
#[derive(Debug, Clone)]
pub struct Configurable {
    version: Version,
    order: Vec<String>,
    params: HashMap<String, Parameter>,
}

impl Configurable {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            order: Vec::new(),
            params: HashMap::new(),
        }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Adds a new parameter, failing if its name is already registered.
    pub fn register(&mut self, p: Parameter) -> Result<(), Problem> {
        let name = p.name().to_string();
        if self.params.contains_key(&name) {
            return Err(()).via(ParameterError::Duplicate { name });
        }
        self.order.push(name.clone());
        self.params.insert(name, p);
        Ok(())
    }

    /// Sets a registered parameter's value, validated against its domain.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<(), Problem> {
        let p = self
            .params
            .get_mut(name)
            .ok_or(())
            .via(ParameterError::NotFound { name: name.to_string() })?;
        p.set(value)
    }

    pub fn get(&self, name: &str) -> Result<&ParamValue, Problem> {
        self.params
            .get(name)
            .map(Parameter::value)
            .ok_or(())
            .via(ParameterError::NotFound { name: name.to_string() })
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, Problem> {
        self.params
            .get(name)
            .ok_or(())
            .via(ParameterError::NotFound { name: name.to_string() })
    }

    /// Parameters in registration order.
    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.order.iter().map(move |n| &self.params[n])
    }

    /// Little-endian `(major, minor, patch)` header followed by a
    /// length-prefixed `(name, tag, value)` list, in registration order.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.major.to_le_bytes());
        out.extend_from_slice(&self.version.minor.to_le_bytes());
        out.extend_from_slice(&self.version.patch.to_le_bytes());
        out.extend_from_slice(&(self.order.len() as u32).to_le_bytes());

        for name in &self.order {
            let p = &self.params[name];
            write_str(&mut out, name);
            match p.value() {
                ParamValue::Int(v) => {
                    out.push(TAG_INT);
                    out.extend_from_slice(&v.to_le_bytes());
                }
                ParamValue::Float(v) => {
                    out.push(TAG_FLOAT);
                    out.extend_from_slice(&v.to_le_bytes());
                }
                ParamValue::Enum(v) => {
                    out.push(TAG_ENUM);
                    write_str(&mut out, v);
                }
            }
        }
        out
    }

    /// Applies a serialized stream to this already-registered parameter set,
    /// validating each value against its existing domain. Rejects a stream
    /// whose major version exceeds this instance's.
    pub fn deserialize(&mut self, bytes: &[u8]) -> Result<(), Problem> {
        let mut r = Reader::new(bytes);
        let major = r.read_i32()?;
        let minor = r.read_i32()?;
        let patch = r.read_i32()?;
        if major > self.version.major {
            return Err(()).via(ParameterError::IncompatibleVersion {
                found: major,
                expected: self.version.major,
            });
        }
        let _ = (minor, patch);

        let count = r.read_u32()?;
        for _ in 0..count {
            let name = r.read_str()?;
            let tag = r.read_u8()?;
            let value = match tag {
                TAG_INT => ParamValue::Int(r.read_i64()?),
                TAG_FLOAT => ParamValue::Float(r.read_f64()?),
                TAG_ENUM => ParamValue::Enum(r.read_str()?),
                _ => return Err(()).via(ParameterError::MalformedStream),
            };
            self.set(&name, value)?;
        }
        Ok(())
    }
}

fn write_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], Problem> {
        if self.pos + n > self.bytes.len() {
            return Err(()).via(ParameterError::MalformedStream);
        }
        let s = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn read_i32(&mut self) -> Result<i32, Problem> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32, Problem> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u8(&mut self) -> Result<u8, Problem> {
        Ok(self.take(1)?[0])
    }

    fn read_i64(&mut self) -> Result<i64, Problem> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> Result<f64, Problem> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_str(&mut self) -> Result<String, Problem> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ()).via(ParameterError::MalformedStream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::parameter::Domain;

    fn sample() -> Configurable {
        let mut c = Configurable::new(Version::new(1, 0, 0));
        c.register(Parameter::int("max_evals", 10_000, Domain::int_range(1, 1_000_000)).unwrap())
            .unwrap();
        c.register(Parameter::float("epsilon", 1e-8, Domain::positive_float(1.0)).unwrap())
            .unwrap();
        c.register(Parameter::enum_value("lsearchk", "backtracking", &["backtracking", "fletcher"]).unwrap())
            .unwrap();
        c
    }

    #[test]
    fn round_trips_through_binary_format() {
        let mut c = sample();
        c.set("max_evals", ParamValue::Int(42)).unwrap();
        c.set("lsearchk", ParamValue::Enum("fletcher".to_string())).unwrap();
        let bytes = c.serialize();

        let mut c2 = sample();
        c2.deserialize(&bytes).unwrap();
        assert_eq!(c2.get("max_evals").unwrap(), &ParamValue::Int(42));
        assert_eq!(c2.get("lsearchk").unwrap(), &ParamValue::Enum("fletcher".to_string()));
    }

    #[test]
    fn rejects_newer_major_version() {
        let c = sample();
        let mut bytes = c.serialize();
        bytes[0..4].copy_from_slice(&99i32.to_le_bytes());
        let mut c2 = sample();
        assert!(c2.deserialize(&bytes).is_err());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut c = sample();
        assert!(c
            .register(Parameter::int("max_evals", 1, Domain::int_range(1, 2)).unwrap())
            .is_err());
    }
}
