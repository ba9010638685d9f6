use crate::error::ValidationError;

/// Cities shown when nothing else is configured.
pub const DEFAULT_CITIES: [&str; 3] = ["London", "New York", "Tokyo"];

/// Ordered, duplicate-free list of tracked city names.
///
/// Order is display order. Equality is case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CityList {
    names: Vec<String>,
}

impl CityList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from an initial list, skipping blanks and repeats.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for name in names {
            // blanks and repeats in configuration are not worth failing over
            let _ = list.add(name.as_ref());
        }
        list
    }

    /// Trim and append. Returns the stored name.
    pub fn add(&mut self, name: &str) -> Result<String, ValidationError> {
        let name = Self::validate_unique(&self.names, name.trim())?;
        self.names.push(name.clone());
        Ok(name)
    }

    /// Insert at the front; used for geolocation results.
    pub fn prepend(&mut self, name: &str) -> Result<(), ValidationError> {
        let name = Self::validate_unique(&self.names, name.trim())?;
        self.names.insert(0, name);
        Ok(())
    }

    /// Remove the exact match. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.names.iter().position(|n| n == name) {
            Some(idx) => {
                self.names.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.names.clone()
    }

    fn validate_unique(existing: &[String], name: &str) -> Result<String, ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::Blank);
        }
        if existing.iter().any(|n| n == name) {
            return Err(ValidationError::Duplicate(name.to_string()));
        }
        Ok(name.to_string())
    }
}
