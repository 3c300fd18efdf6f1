// src/cache/fingerprint.rs

use std::fmt;

use blake3::Hasher;

use crate::graph::Stage;
use crate::transform::Artifact;
use crate::types::BuildMode;

/// Bumped whenever the hashed layout changes so old entries stop matching.
const FINGERPRINT_VERSION: &[u8] = b"assetflow-fingerprint-v1";

/// Cache key: blake3 over everything that can change a stage's output.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint a stage invocation.
    ///
    /// Covers the stage name, every operation with its options, the output
    /// location, the build mode and each input's relative path and bytes in
    /// selection order. Every field is length-prefixed so adjacent fields
    /// cannot run into each other.
    pub fn compute(stage: &Stage, mode: BuildMode, inputs: &[Artifact]) -> Self {
        let mut hasher = Hasher::new();
        update_field(&mut hasher, FINGERPRINT_VERSION);
        update_field(&mut hasher, stage.name.as_bytes());

        hasher.update(&(stage.operations.len() as u64).to_le_bytes());
        for op in &stage.operations {
            update_field(&mut hasher, op.uses.as_bytes());
            hasher.update(&(op.options.len() as u64).to_le_bytes());
            for (key, value) in &op.options {
                update_field(&mut hasher, key.as_bytes());
                update_field(&mut hasher, value.to_string().as_bytes());
            }
        }

        let output = stage
            .output
            .as_ref()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        update_field(&mut hasher, output.as_bytes());
        update_field(&mut hasher, mode.as_str().as_bytes());

        hasher.update(&(inputs.len() as u64).to_le_bytes());
        for input in inputs {
            update_field(&mut hasher, input.path_str().as_bytes());
            update_field(&mut hasher, &input.contents);
        }

        Self(*hasher.finalize().as_bytes())
    }

    /// Content address of a blob.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        blake3::Hash::from_bytes(self.0).to_hex().to_string()
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        blake3::Hash::from_hex(hex).ok().map(|h| Self(*h.as_bytes()))
    }
}

fn update_field(hasher: &mut Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Operation;

    fn stage() -> Stage {
        Stage::new("styles")
            .input("css/**/*.scss")
            .output("assets/css")
            .cached(true)
            .operation(Operation::new("rename").option("suffix", ".min"))
    }

    fn inputs() -> Vec<Artifact> {
        vec![Artifact::new("a.scss", "a{}"), Artifact::new("b.scss", "b{}")]
    }

    #[test]
    fn stable_for_identical_invocations() {
        let a = Fingerprint::compute(&stage(), BuildMode::Production, &inputs());
        let b = Fingerprint::compute(&stage(), BuildMode::Production, &inputs());
        assert_eq!(a, b);
    }

    #[test]
    fn every_ingredient_changes_the_key() {
        let base = Fingerprint::compute(&stage(), BuildMode::Production, &inputs());

        assert_ne!(base, Fingerprint::compute(&stage(), BuildMode::Development, &inputs()));

        let mut edited = inputs();
        edited[1].contents = b"b{ }".to_vec();
        assert_ne!(base, Fingerprint::compute(&stage(), BuildMode::Production, &edited));

        let mut renamed = inputs();
        renamed[0].path = "c.scss".into();
        assert_ne!(base, Fingerprint::compute(&stage(), BuildMode::Production, &renamed));

        let other_opts = stage();
        let other_opts = Stage {
            operations: vec![Operation::new("rename").option("suffix", ".x")],
            ..other_opts
        };
        assert_ne!(base, Fingerprint::compute(&other_opts, BuildMode::Production, &inputs()));

        let moved = stage().output("public/css");
        assert_ne!(base, Fingerprint::compute(&moved, BuildMode::Production, &inputs()));
    }

    #[test]
    fn field_boundaries_matter() {
        let a = [Artifact::new("ab", "c")];
        let b = [Artifact::new("a", "bc")];
        assert_ne!(
            Fingerprint::compute(&stage(), BuildMode::Production, &a),
            Fingerprint::compute(&stage(), BuildMode::Production, &b)
        );
    }

    #[test]
    fn hex_round_trip() {
        let fp = Fingerprint::of_bytes(b"body{}");
        assert_eq!(Fingerprint::from_hex(&fp.to_hex()), Some(fp));
        assert_eq!(Fingerprint::from_hex("zz"), None);
    }
}
