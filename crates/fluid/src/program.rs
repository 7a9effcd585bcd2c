//! Program variants keyed by material and keyword set.
//!
//! Every pass of the simulation is a `Material`. A material can be compiled
//! with a set of keywords (`#define`s), and each distinct combination is a
//! separate program variant. Variants are compiled on first use and kept for
//! the lifetime of the backend; a variant that failed to compile stays failed
//! so the pass is skipped rather than recompiled every frame.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::ProgramError;

/// Keyword that enables diffuse shading in the display program.
pub const SHADING: &str = "SHADING";

/// One full-screen pass of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Material {
    Clear,
    Splat,
    Advection,
    Curl,
    Vorticity,
    Divergence,
    Pressure,
    GradientSubtract,
    Display,
}

impl Material {
    pub const ALL: [Material; 9] = [
        Material::Clear,
        Material::Splat,
        Material::Advection,
        Material::Curl,
        Material::Vorticity,
        Material::Divergence,
        Material::Pressure,
        Material::GradientSubtract,
        Material::Display,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Material::Clear => "clear",
            Material::Splat => "splat",
            Material::Advection => "advection",
            Material::Curl => "curl",
            Material::Vorticity => "vorticity",
            Material::Divergence => "divergence",
            Material::Pressure => "pressure",
            Material::GradientSubtract => "gradient_subtract",
            Material::Display => "display",
        }
    }
}

/// Unordered set of preprocessor keywords.
///
/// Stored sorted, so insertion order never produces a different variant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct KeywordSet {
    keywords: BTreeSet<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keyword: impl Into<String>) -> bool {
        self.keywords.insert(keyword.into())
    }

    pub fn with(mut self, keyword: impl Into<String>) -> Self {
        self.insert(keyword);
        self
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.keywords.contains(keyword)
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    /// Stable 64-bit digest for log lines. Not used as a cache key.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.keywords.hash(&mut hasher);
        hasher.finish()
    }

    /// `#define` lines for every keyword, one per line.
    pub fn defines(&self) -> String {
        self.iter()
            .map(|keyword| format!("#define {keyword}\n"))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keywords: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for KeywordSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keywords.is_empty() {
            return f.write_str("none");
        }
        let joined: Vec<&str> = self.iter().collect();
        f.write_str(&joined.join(","))
    }
}

/// Identity of a program variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub material: Material,
    pub keywords: KeywordSet,
}

impl ProgramKey {
    pub fn new(material: Material, keywords: KeywordSet) -> Self {
        Self { material, keywords }
    }

    pub fn plain(material: Material) -> Self {
        Self::new(material, KeywordSet::new())
    }
}

/// Cached outcome of compiling a variant.
#[derive(Debug)]
pub enum ProgramSlot<P> {
    Ready(Arc<P>),
    Failed(Arc<ProgramError>),
}

impl<P> Clone for ProgramSlot<P> {
    fn clone(&self) -> Self {
        match self {
            ProgramSlot::Ready(program) => ProgramSlot::Ready(Arc::clone(program)),
            ProgramSlot::Failed(err) => ProgramSlot::Failed(Arc::clone(err)),
        }
    }
}

/// Lazily compiled program variants.
#[derive(Debug)]
pub struct ProgramCache<P> {
    slots: HashMap<ProgramKey, ProgramSlot<P>>,
    bound: Option<ProgramKey>,
    compilations: usize,
}

impl<P> Default for ProgramCache<P> {
    fn default() -> Self {
        Self {
            slots: HashMap::new(),
            bound: None,
            compilations: 0,
        }
    }
}

impl<P> ProgramCache<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the variant for `key`, compiling it the first time it is requested.
    ///
    /// A compile failure is logged once and remembered; later lookups return
    /// the same error without invoking `compile` again.
    pub fn get_or_compile<F>(
        &mut self,
        key: &ProgramKey,
        compile: F,
    ) -> Result<Arc<P>, Arc<ProgramError>>
    where
        F: FnOnce(&ProgramKey) -> Result<P, ProgramError>,
    {
        if let Some(slot) = self.slots.get(key) {
            return match slot {
                ProgramSlot::Ready(program) => Ok(Arc::clone(program)),
                ProgramSlot::Failed(err) => Err(Arc::clone(err)),
            };
        }

        self.compilations += 1;
        let slot = match compile(key) {
            Ok(program) => {
                tracing::debug!(
                    material = key.material.name(),
                    keywords = %key.keywords,
                    fingerprint = format_args!("{:016x}", key.keywords.fingerprint()),
                    "compiled program variant"
                );
                ProgramSlot::Ready(Arc::new(program))
            }
            Err(err) => {
                tracing::error!(
                    material = key.material.name(),
                    keywords = %key.keywords,
                    error = %err,
                    "program variant failed to compile; pass disabled"
                );
                ProgramSlot::Failed(Arc::new(err))
            }
        };
        self.slots.insert(key.clone(), slot.clone());
        match slot {
            ProgramSlot::Ready(program) => Ok(program),
            ProgramSlot::Failed(err) => Err(err),
        }
    }

    /// Marks `key` as the active program. Returns `false` when it already was.
    pub fn bind(&mut self, key: &ProgramKey) -> bool {
        if self.bound.as_ref() == Some(key) {
            return false;
        }
        self.bound = Some(key.clone());
        true
    }

    pub fn bound(&self) -> Option<&ProgramKey> {
        self.bound.as_ref()
    }

    pub fn slot(&self, key: &ProgramKey) -> Option<&ProgramSlot<P>> {
        self.slots.get(key)
    }

    /// Number of compile attempts, successful or not.
    pub fn compilations(&self) -> usize {
        self.compilations
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
