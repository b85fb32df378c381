//! Registry of model versions per country.
//!
//! A simulation spec may name a model version or leave it out. The
//! creation API resolves it once at submission so the stored spec always
//! carries a concrete version; the compute API resolves again before
//! running in case the registry changed in between.

use std::collections::{BTreeMap, BTreeSet};

use simflow_types::{Country, CountryVersions};

use crate::config::ModelsConfig;
use crate::error::ModelError;

/// Alias accepted in requests for the newest registered version.
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    latest: String,
    versions: BTreeSet<String>,
}

/// Known model versions, keyed by country.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    entries: BTreeMap<Country, Entry>,
}

impl ModelRegistry {
    /// Build the registry from the `models` config section.
    pub fn from_config(models: &ModelsConfig) -> Self {
        let entries = [Country::Us, Country::Uk]
            .into_iter()
            .map(|country| {
                let section = models.for_country(country);
                let mut versions = section.versions.clone();
                versions.insert(section.latest.clone());
                (
                    country,
                    Entry {
                        latest: section.latest.clone(),
                        versions,
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Resolve `requested` (or `latest` when absent) to a concrete version.
    ///
    /// # Errors
    ///
    /// [`ModelError::UnknownCountry`] if no model is registered for the
    /// country, [`ModelError::UnknownVersion`] if the version is not known.
    pub fn resolve(&self, country: Country, requested: Option<&str>) -> Result<String, ModelError> {
        let entry = self
            .entries
            .get(&country)
            .ok_or_else(|| ModelError::UnknownCountry(country.to_string()))?;

        match requested.map(str::trim) {
            None | Some(LATEST) => Ok(entry.latest.clone()),
            Some(version) if entry.versions.contains(version) => Ok(version.to_owned()),
            Some(version) => Err(ModelError::UnknownVersion {
                country,
                version: version.to_owned(),
            }),
        }
    }

    /// Versions registered for `country`.
    pub fn versions(&self, country: Country) -> Option<CountryVersions> {
        self.entries.get(&country).map(|entry| CountryVersions {
            latest: entry.latest.clone(),
            versions: entry.versions.iter().cloned().collect(),
        })
    }

    /// Every country with its versions, keyed by country code.
    pub fn all(&self) -> BTreeMap<String, CountryVersions> {
        self.entries
            .keys()
            .filter_map(|country| {
                self.versions(*country)
                    .map(|versions| (country.code().to_owned(), versions))
            })
            .collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::from_config(&ModelsConfig::default())
    }
}
