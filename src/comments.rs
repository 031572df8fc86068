//! utterances comment widget.

use serde::Serialize;

use crate::config::CommentsConfig;

pub const SCRIPT_SRC: &str = "https://utteranc.es/client.js";

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct CommentsScript {
    pub src: &'static str,
    pub repo: String,
    pub issue_term: String,
    pub theme: String,
}

/// Hands out the widget's script once per page.
#[derive(Debug)]
pub struct CommentsWidget<'a> {
    config: &'a CommentsConfig,
    mounted: bool,
}

impl<'a> CommentsWidget<'a> {
    pub fn new(config: &'a CommentsConfig) -> Self {
        CommentsWidget {
            config,
            mounted: false,
        }
    }

    pub fn mount(&mut self) -> Option<CommentsScript> {
        if self.mounted {
            return None;
        }
        self.mounted = true;

        Some(CommentsScript {
            src: SCRIPT_SRC,
            repo: self.config.repo.clone(),
            issue_term: self.config.issue_term.clone(),
            theme: self.config.theme.clone(),
        })
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }
}
