// self
use crate::obs::GateOutcome;

/// Records a gate decision via the global metrics recorder (when enabled).
pub fn record_gate_outcome(outcome: GateOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("admission_gate_decision_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
