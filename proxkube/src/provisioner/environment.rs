//! Preparation of the hypervisor host.

use super::{output, Provisioner};
use crate::errors::Result;

impl Provisioner {
    /// Creates the data directory on the hypervisor host and downloads the
    /// OS cloud image if it is not there yet.
    ///
    /// Returns `true` when the image was downloaded.
    pub async fn setup_environment(&self) -> Result<bool> {
        let data_dir = self.config.data_dir.as_str();

        self.observe(
            format!("Prepare [{data_dir}] data directory on Proxmox"),
            output(self.host.as_ref(), &format!("mkdir {data_dir} -p")),
        )
        .await?;

        let present = self
            .observe("Check availability of linux cloud image".to_string(), self.image_present())
            .await?;
        if present {
            tracing::debug!(image = %self.config.image_path(), "OS image already present");
            return Ok(false);
        }

        let download = format!("wget -q {} -P {data_dir}", self.config.os_image_url);
        self.observe("Download OS image".to_string(), output(self.host.as_ref(), &download))
            .await?;
        tracing::info!(image = %self.config.image_path(), "OS image downloaded");
        Ok(true)
    }

    /// `test -e` exits 0 when the image exists and 1 when it does not.
    async fn image_present(&self) -> Result<bool> {
        let result = self
            .host
            .execute(&format!("test -e {}", self.config.image_path()))
            .await?;
        let code = result.code();
        match result.into_output() {
            Ok(_) => Ok(true),
            Err(_) if code == 1 => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
