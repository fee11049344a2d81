use serde::Serialize;
use tokio::sync::mpsc;

use crate::core::classifier::Classification;
use crate::core::generator::SubstitutionTuple;
use crate::http::{PreparedRequest, ResponseSnapshot};
use crate::modules::traffic_log::InterestingStore;
use crate::utils::sanitize_filename;
use crate::SinkRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub request: PreparedRequest,
    pub response: ResponseSnapshot,
    pub classification: Classification,
}

/// A filter-surviving outcome together with the tuple that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// 1-based enumeration index of the iteration.
    pub index: usize,
    pub tuple: SubstitutionTuple,
    pub outcome: DispatchOutcome,
}

impl Finding {
    pub fn is_interesting(&self) -> bool {
        self.outcome.classification.is_interesting()
    }

    /// File name for the standalone copy of an interesting response:
    /// `<param>_<payload>.txt` for one active parameter, `combo_<v1>_<v2>.txt` otherwise.
    pub fn artifact_file_name(&self) -> String {
        let active: Vec<_> = self.tuple.active().collect();
        match active.as_slice() {
            [single] => format!(
                "{}_{}.txt",
                sanitize_filename(&single.name),
                sanitize_filename(&single.value)
            ),
            many => {
                let joined = many.iter().map(|a| a.value.as_str()).collect::<Vec<_>>().join("_");
                format!("combo_{}.txt", sanitize_filename(&joined))
            }
        }
    }
}

/// Single writer for the run's findings.
pub struct FindingAggregator;

impl FindingAggregator {
    /// Drains the channel until every sender is dropped, persisting interesting
    /// responses when a store is given. Returns findings ordered by enumeration index.
    pub async fn run(
        mut receiver: mpsc::Receiver<Finding>,
        store: Option<InterestingStore>,
        sink: SinkRef,
    ) -> Vec<Finding> {
        let mut findings = Vec::new();

        while let Some(finding) = receiver.recv().await {
            if finding.is_interesting() {
                if let Some(ref store) = store {
                    match store.save(&finding) {
                        Ok(path) => log::debug!("Saved interesting response to {}", path.display()),
                        Err(e) => sink.on_log(
                            "error",
                            &format!("[!] Failed to save interesting response #{}: {}", finding.index, e),
                        ),
                    }
                }
            }
            findings.push(finding);
        }

        findings.sort_by_key(|f| f.index);
        findings
    }
}
