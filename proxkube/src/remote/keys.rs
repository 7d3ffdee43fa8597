//! SSH key pair generation.

use crate::errors::ProvisionError;
use crate::model::KeyPair;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::process::Command;

/// Produces fresh SSH key pairs.
#[async_trait]
pub trait KeyPairGenerator: Send + Sync {
    /// Generates a key pair labelled with `comment`.
    async fn generate(&self, comment: &str) -> Result<KeyPair, ProvisionError>;
}

/// Generates RSA keys with `ssh-keygen` in a scratch directory.
#[derive(Debug, Clone)]
pub struct SshKeygen {
    work_dir: PathBuf,
    bits: u32,
    program: String,
}

impl SshKeygen {
    /// Creates a generator using `work_dir` for temporary key files.
    #[must_use]
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            bits: 4096,
            program: "ssh-keygen".to_string(),
        }
    }

    /// Sets the RSA modulus size.
    #[must_use]
    pub fn with_bits(mut self, bits: u32) -> Self {
        self.bits = bits;
        self
    }

    /// Overrides the `ssh-keygen` binary.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for SshKeygen {
    fn default() -> Self {
        Self::new(std::env::temp_dir())
    }
}

#[async_trait]
impl KeyPairGenerator for SshKeygen {
    async fn generate(&self, comment: &str) -> Result<KeyPair, ProvisionError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("proxkube-keygen-")
            .tempdir_in(&self.work_dir)?;
        let private_path = scratch.path().join("id_rsa");
        let public_path = private_path.with_extension("pub");

        let output = Command::new(&self.program)
            .args(["-q", "-t", "rsa", "-N", "", "-b"])
            .arg(self.bits.to_string())
            .arg("-C")
            .arg(comment)
            .arg("-f")
            .arg(&private_path)
            .output()
            .await
            .map_err(|e| ProvisionError::KeyGeneration(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(ProvisionError::KeyGeneration(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let private_key = tokio::fs::read_to_string(&private_path).await?;
        let public_key = tokio::fs::read_to_string(&public_path).await?;
        scratch.close()?;

        Ok(KeyPair::new(public_key.trim(), private_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Writes an executable `ssh-keygen` stand-in running `body` with the
    /// key path in `$key`.
    #[cfg(unix)]
    fn fake_keygen(dir: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let program = dir.join("fake-ssh-keygen");
        let script = format!("#!/bin/sh\nfor arg; do key=\"$arg\"; done\n{body}\n");
        std::fs::write(&program, script).unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();
        program
    }

    #[cfg(unix)]
    fn leftovers(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_generated_pair_is_read_and_scratch_removed() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let program = fake_keygen(
            bin.path(),
            "echo PRIVATE > \"$key\"; echo 'ssh-rsa AAAA demo' > \"$key.pub\"",
        );
        let generator = SshKeygen::new(work.path()).with_program(program.to_string_lossy());

        let pair = generator.generate("demo").await.unwrap();

        assert_eq!(pair.public_key, "ssh-rsa AAAA demo");
        assert_eq!(pair.private_key, "PRIVATE\n");
        assert_eq!(leftovers(work.path()), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_public_key_leaves_no_private_key_behind() {
        let bin = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let program = fake_keygen(bin.path(), "echo PRIVATE > \"$key\"");
        let generator = SshKeygen::new(work.path()).with_program(program.to_string_lossy());

        let err = generator.generate("demo").await.unwrap_err();

        assert!(matches!(err, ProvisionError::Io(_)));
        assert_eq!(leftovers(work.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_program_is_key_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let generator = SshKeygen::new(dir.path()).with_program("/nonexistent/ssh-keygen");

        let err = generator.generate("demo").await.unwrap_err();

        assert!(matches!(err, ProvisionError::KeyGeneration(_)));
    }
}
