use pidscope_types::{FlightAnalysisResult, FlightFailure, FlightOutcome};

/// Outcome of one flight of a batch, by its position in the input
#[derive(Debug, Clone, PartialEq)]
pub struct FlightReport {
    pub index: usize,
    pub outcome: FlightOutcome,
}

/// Per-flight outcomes of a batch analysis, in input order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub flights: Vec<FlightReport>,
}

impl BatchReport {
    pub fn push(&mut self, index: usize, outcome: FlightOutcome) {
        self.flights.push(FlightReport { index, outcome });
    }

    pub fn results(&self) -> impl Iterator<Item = &FlightAnalysisResult> {
        self.flights.iter().filter_map(|flight| match &flight.outcome {
            FlightOutcome::Analyzed(result) => Some(result.as_ref()),
            FlightOutcome::Failed(_) => None,
        })
    }

    /// Failed flights with their input index
    pub fn failures(&self) -> impl Iterator<Item = (usize, &FlightFailure)> {
        self.flights.iter().filter_map(|flight| match &flight.outcome {
            FlightOutcome::Failed(failure) => Some((flight.index, failure)),
            FlightOutcome::Analyzed(_) => None,
        })
    }

    pub fn analyzed_count(&self) -> usize {
        self.results().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Successful results only, in input order
    pub fn into_results(self) -> Vec<FlightAnalysisResult> {
        self.flights
            .into_iter()
            .filter_map(|flight| flight.outcome.into_result().ok())
            .collect()
    }
}
