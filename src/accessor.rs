use std::fmt;

use crate::{Error, ModelRef, ModelType, Property, Result, Value, ValueKind};

/// Set of permitted access directions.
///
/// An accessor's effective modes are the intersection of what its property
/// supports and what the template node allows.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessModes {
    read: bool,
    write: bool,
}

impl AccessModes {
    pub const READ_WRITE: AccessModes = AccessModes::new(true, true);
    pub const READ_ONLY: AccessModes = AccessModes::new(true, false);
    pub const WRITE_ONLY: AccessModes = AccessModes::new(false, true);
    pub const NONE: AccessModes = AccessModes::new(false, false);

    #[inline]
    pub const fn new(read: bool, write: bool) -> Self {
        AccessModes { read, write }
    }

    #[inline]
    pub const fn can_read(self) -> bool {
        self.read
    }

    #[inline]
    pub const fn can_write(self) -> bool {
        self.write
    }

    #[inline]
    pub const fn intersect(self, other: AccessModes) -> AccessModes {
        AccessModes::new(self.read && other.read, self.write && other.write)
    }
}

impl Default for AccessModes {
    fn default() -> Self {
        AccessModes::READ_WRITE
    }
}

impl fmt::Debug for AccessModes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.read, self.write) {
            (true, true) => f.write_str("READ_WRITE"),
            (true, false) => f.write_str("READ_ONLY"),
            (false, true) => f.write_str("WRITE_ONLY"),
            (false, false) => f.write_str("NONE"),
        }
    }
}

/// Bound read/write capability for one named property of a model type.
///
/// Reading through an accessor that cannot read yields `None` ("undefined"),
/// and writing through one that cannot write does nothing. Neither is an error.
#[derive(Clone)]
pub struct Accessor {
    owner: ModelType,
    property: Property,
    allowed: AccessModes,
}

impl Accessor {
    /// Binds `name` on `owner` (or one of its ancestors).
    pub fn resolve(owner: &ModelType, name: &str) -> Result<Accessor> {
        let property = owner.property(name).ok_or_else(|| Error::UnknownProperty {
            model: owner.name().to_string(),
            property: name.to_string(),
        })?;
        Ok(Accessor {
            owner: owner.clone(),
            property: property.clone(),
            allowed: AccessModes::READ_WRITE,
        })
    }

    /// Narrows the permitted modes.
    pub fn restrict(mut self, modes: AccessModes) -> Self {
        self.allowed = self.allowed.intersect(modes);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.property.name()
    }

    #[inline]
    pub fn owner(&self) -> &ModelType {
        &self.owner
    }

    #[inline]
    pub fn kind(&self) -> &ValueKind {
        self.property.kind()
    }

    pub fn modes(&self) -> AccessModes {
        self.property.modes().intersect(self.allowed)
    }

    #[inline]
    pub fn can_read(&self) -> bool {
        self.modes().can_read()
    }

    #[inline]
    pub fn can_write(&self) -> bool {
        self.modes().can_write()
    }

    /// Reads the property; `Ok(None)` when the accessor cannot read.
    pub fn get(&self, model: &ModelRef) -> Result<Option<Value>> {
        if !self.allowed.can_read() {
            return Ok(None);
        }
        self.property
            .read(model)
            .map_err(|e| e.in_property(self.name()))
    }

    /// Writes the property; a no-op when the accessor cannot write.
    pub fn set(&self, model: &ModelRef, value: Value) -> Result<()> {
        if !self.allowed.can_write() {
            return Ok(());
        }
        self.property
            .write(model, value)
            .map(drop)
            .map_err(|e| e.in_property(self.name()))
    }

    /// Reads a multi-valued property as a sequence.
    ///
    /// Null and undefined both read as `None`.
    pub fn get_all(&self, model: &ModelRef) -> Result<Option<Vec<Value>>> {
        match self.get(model)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::List(items)) => Ok(Some(items)),
            Some(other) => Err(Error::mismatch("list", other.type_name()).in_property(self.name())),
        }
    }

    /// Re-binds this accessor to the same-named property of a subtype.
    pub fn for_subtype(&self, subtype: &ModelType) -> Result<Accessor> {
        Ok(Accessor::resolve(subtype, self.name())?.restrict(self.allowed))
    }
}

impl fmt::Debug for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Accessor({}.{}, {:?})", self.owner.name(), self.name(), self.modes())
    }
}
