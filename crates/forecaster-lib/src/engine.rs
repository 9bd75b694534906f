//! Iterative multi-step forecasting
//!
//! The model only ever predicts one hour ahead from a window of the last W
//! hours. To reach hour H the engine performs an autoregressive rollout: it
//! predicts the next value, drops the oldest reading from a private copy of
//! the window, appends the prediction, and repeats. Only the H-th prediction
//! is returned.
//!
//! # Accuracy with horizon
//!
//! From the second step on, the model consumes its own earlier predictions as
//! if they were observed history, so each step's error becomes part of the
//! next step's input. Forecast error therefore grows with H in expectation.
//! This is a property of the modeling approach, not something the engine
//! corrects for.
//!
//! # Exogenous conditions
//!
//! The same scaled exogenous vector is used for every step of a rollout.
//! Conditions that change over the horizon (hour of day, temperature) are
//! not modeled.

use crate::error::Result;
use crate::models::{ConsumptionWindow, ForecastHorizon, NormalizedVector};
use crate::predictor::StepModel;
use tracing::trace;

/// Rolls a [`StepModel`] forward over a fixed-length window
pub struct IterativeForecaster<'a, M: StepModel + ?Sized> {
    model: &'a M,
}

impl<'a, M: StepModel + ?Sized> IterativeForecaster<'a, M> {
    pub fn new(model: &'a M) -> Self {
        Self { model }
    }

    /// Normalized prediction for exactly `horizon` steps past the end of
    /// `initial`.
    ///
    /// Performs `horizon` sequential model calls. `initial` is never
    /// modified. The first failing step aborts the rollout and its error is
    /// returned; intermediate predictions are discarded.
    pub fn forecast(
        &self,
        initial: &ConsumptionWindow,
        exo: &NormalizedVector,
        horizon: ForecastHorizon,
    ) -> Result<f64> {
        let mut window = initial.clone();
        let mut prediction = self.model.predict_step(&window, exo)?;
        trace!(step = 1, prediction, "Rollout step");

        for step in 2..=horizon.get() {
            window.push_latest(prediction);
            prediction = self.model.predict_step(&window, exo)?;
            trace!(step, prediction, "Rollout step");
        }
        Ok(prediction)
    }
}
