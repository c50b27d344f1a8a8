//! Workload catalog: which container image runs on the instance and the
//! ordered commands that get it running.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::WorkloadError;

/// Docker image references accepted on the command line or in settings.
///
/// The reference is interpolated into remote shell commands, so anything
/// outside this character set is rejected.
pub static IMAGE_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._/:@-]{0,254}$").expect("valid regex")
});

/// The three selectable workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Workload {
    Nginx,
    Mysql,
    Custom,
}

/// Catalog in menu order.
pub const CATALOG: [Workload; 3] = [Workload::Nginx, Workload::Mysql, Workload::Custom];

impl Workload {
    /// Menu letter.
    #[must_use]
    pub fn label(self) -> char {
        match self {
            Self::Nginx => 'A',
            Self::Mysql => 'B',
            Self::Custom => 'C',
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Nginx => "nginx",
            Self::Mysql => "mysql",
            Self::Custom => "custom",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Nginx => "NGINX web server on port 80",
            Self::Mysql => "MySQL database on port 3306",
            Self::Custom => "Custom Docker image",
        }
    }

    /// Image pulled when nothing overrides it. `Custom` has none.
    #[must_use]
    pub fn default_image(self) -> Option<&'static str> {
        match self {
            Self::Nginx => Some("nginx:stable"),
            Self::Mysql => Some("mysql:8"),
            Self::Custom => None,
        }
    }

    fn run_args(self) -> &'static str {
        match self {
            Self::Nginx => "-p 80:80",
            Self::Mysql => "-p 3306:3306 -e MYSQL_RANDOM_ROOT_PASSWORD=yes",
            Self::Custom => "",
        }
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workload {
    type Err = WorkloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "1" | "nginx" => Ok(Self::Nginx),
            "b" | "2" | "mysql" => Ok(Self::Mysql),
            "c" | "3" | "custom" => Ok(Self::Custom),
            _ => Err(WorkloadError::Unknown(s.to_string())),
        }
    }
}

/// A workload bound to a concrete image. Fixed for the whole session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkloadSelection {
    workload: Workload,
    image: String,
}

impl WorkloadSelection {
    /// Bind a workload to its image.
    ///
    /// Precedence: explicit override, then the configured custom image (for
    /// `Custom` only), then the catalog default.
    ///
    /// # Errors
    ///
    /// Returns an error if `Custom` has no image or the image reference is
    /// not acceptable.
    pub fn resolve(
        workload: Workload,
        override_image: Option<&str>,
        custom_image: Option<&str>,
    ) -> Result<Self, WorkloadError> {
        let image = override_image
            .or(match workload {
                Workload::Custom => custom_image,
                _ => None,
            })
            .or(workload.default_image())
            .ok_or(WorkloadError::MissingImage)?;
        if !IMAGE_REF_RE.is_match(image) {
            return Err(WorkloadError::InvalidImage(image.to_string()));
        }
        Ok(Self {
            workload,
            image: image.to_string(),
        })
    }

    #[must_use]
    pub fn workload(&self) -> Workload {
        self.workload
    }

    #[must_use]
    pub fn image(&self) -> &str {
        &self.image
    }

    /// Remote commands, in the order they must run.
    #[must_use]
    pub fn commands(&self) -> Vec<String> {
        let run_args = self.workload.run_args();
        let mut run = format!(
            "sudo docker run -d --name ephem-{} --restart unless-stopped",
            self.workload.name()
        );
        if !run_args.is_empty() {
            run.push(' ');
            run.push_str(run_args);
        }
        run.push(' ');
        run.push_str(&self.image);

        vec![
            "sudo yum install -y docker".to_string(),
            "sudo systemctl enable --now docker".to_string(),
            format!("sudo docker pull {}", self.image),
            run,
        ]
    }
}
