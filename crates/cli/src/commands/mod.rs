//! CLI Commands

pub mod list;
pub mod run;

use std::path::PathBuf;

use clap::Args;
use cvkit_e2e::{E2eResult, SuiteSpec};

/// Where suite files come from, shared by `run` and `list`
#[derive(Args, Debug, Clone)]
pub struct SpecArgs {
    /// Directory of YAML suite files (searched recursively)
    #[arg(short, long, env = "CVKIT_SPECS", default_value = "e2e/suites")]
    pub specs: PathBuf,

    /// Only suites carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,
}

impl SpecArgs {
    pub fn load(&self) -> E2eResult<Vec<SuiteSpec>> {
        let all = SuiteSpec::load_all(&self.specs)?;
        Ok(match &self.tag {
            Some(tag) => SuiteSpec::filter_by_tag(&all, tag).into_iter().cloned().collect(),
            None => all,
        })
    }
}
