use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ModuleId;

const DIGEST_DOMAIN: &[u8] = b"strata-module-v1\0";

/// How a module reaches one of its dependencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Loaded together with the importer.
    #[default]
    Static,
    /// Lazy-load boundary; the target is fetched on demand.
    Dynamic,
}

impl DependencyKind {
    fn tag(self) -> u8 {
        match self {
            DependencyKind::Static => b's',
            DependencyKind::Dynamic => b'd',
        }
    }
}

/// Outgoing edge of a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub target: ModuleId,
    #[serde(default)]
    pub kind: DependencyKind,
}

impl Dependency {
    pub fn new(target: ModuleId, kind: DependencyKind) -> Self {
        Self { target, kind }
    }

    pub fn is_static(&self) -> bool {
        self.kind == DependencyKind::Static
    }
}

/// blake3 digest of a module's identifier, content and edges.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleDigest([u8; 32]);

impl ModuleDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }
}

impl fmt::Debug for ModuleDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ModuleDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A single source unit: identifier, raw content and ordered dependency edges.
///
/// Modules are immutable once built; the digest is computed eagerly so the
/// partitioner, hasher and cache can share it without rehashing content.
/// Content and edges sit behind `Arc` so cloning a module out of the graph
/// stays cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    content: Arc<[u8]>,
    dependencies: Arc<[Dependency]>,
    digest: ModuleDigest,
}

impl Module {
    /// Start building a module with the given id and content.
    pub fn builder(id: ModuleId, content: impl Into<Vec<u8>>) -> ModuleBuilder {
        ModuleBuilder {
            id,
            content: content.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn id(&self) -> &ModuleId {
        &self.id
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Ordered, deduplicated outgoing edges.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Targets of static edges, in declaration order.
    pub fn static_dependencies(&self) -> impl Iterator<Item = &ModuleId> {
        self.dependencies
            .iter()
            .filter(|dep| dep.kind == DependencyKind::Static)
            .map(|dep| &dep.target)
    }

    /// Targets of dynamic (lazy) edges, in declaration order.
    pub fn dynamic_dependencies(&self) -> impl Iterator<Item = &ModuleId> {
        self.dependencies
            .iter()
            .filter(|dep| dep.kind == DependencyKind::Dynamic)
            .map(|dep| &dep.target)
    }

    pub fn digest(&self) -> ModuleDigest {
        self.digest
    }

    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Builder for [`Module`].
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    id: ModuleId,
    content: Vec<u8>,
    dependencies: Vec<Dependency>,
}

impl ModuleBuilder {
    /// Add a static dependency edge.
    pub fn dependency(mut self, target: ModuleId) -> Self {
        self.dependencies
            .push(Dependency::new(target, DependencyKind::Static));
        self
    }

    /// Add a dynamic (lazy-load) dependency edge.
    pub fn dynamic_dependency(mut self, target: ModuleId) -> Self {
        self.dependencies
            .push(Dependency::new(target, DependencyKind::Dynamic));
        self
    }

    pub fn edge(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Finish the module, deduplicating edges and computing the digest.
    ///
    /// When the same target appears more than once, the first position is
    /// kept and a static edge wins over a dynamic one.
    pub fn build(self) -> Module {
        let mut deduped: Vec<Dependency> = Vec::with_capacity(self.dependencies.len());
        for dep in self.dependencies {
            match deduped.iter_mut().find(|seen| seen.target == dep.target) {
                Some(seen) => {
                    if dep.kind == DependencyKind::Static {
                        seen.kind = DependencyKind::Static;
                    }
                }
                None => deduped.push(dep),
            }
        }

        let digest = compute_digest(&self.id, &self.content, &deduped);

        Module {
            id: self.id,
            content: Arc::from(self.content),
            dependencies: Arc::from(deduped),
            digest,
        }
    }
}

fn compute_digest(id: &ModuleId, content: &[u8], dependencies: &[Dependency]) -> ModuleDigest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(DIGEST_DOMAIN);
    hasher.update(id.as_str().as_bytes());
    hasher.update(b"\0");
    hasher.update(&(content.len() as u64).to_le_bytes());
    hasher.update(content);
    for dep in dependencies {
        hasher.update(&[dep.kind.tag()]);
        hasher.update(dep.target.as_str().as_bytes());
        hasher.update(b"\0");
    }
    ModuleDigest(*hasher.finalize().as_bytes())
}
