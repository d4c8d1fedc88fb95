//! Shared tunable state and the evaluation pipeline.
//!
//! A [`TuningSession`] computes the channel once and then scores any
//! [`EqTuning`] through FFE synthesis, CTLE synthesis, composition and the
//! ISI cost. The live tuning is what optimizers and users mutate; the
//! committed tuning is the saved copy that `reset_eq` returns to.

use crate::error::{TuneError, TuneResult};
use crate::sync::RecoverMutex;
use lib_dsp::{
    compose, ChannelModel, ChannelResponse, CostEvaluator, EqualizerSynthesizer, NullSink,
    SeriesSink, SimulationGrid, WaveformImporter,
};
use lib_import::CsvImporter;
use lib_types::{ConfigError, CostState, CtleSettings, EqTuning, ImpulseResponse, LinkConfig};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Tx tuners toggled against the DFE: the three post-cursor taps.
const POST_TAPS: std::ops::Range<usize> = 1..4;

type CtleMemo = Option<(CtleSettings, Arc<ImpulseResponse>)>;

/// Channel, equalizer synthesis and tunable state of one link.
pub struct TuningSession {
    config: LinkConfig,
    grid: SimulationGrid,
    channel: ChannelResponse,
    synth: EqualizerSynthesizer,
    live: Mutex<EqTuning>,
    committed: Mutex<EqTuning>,
    /// Last synthesized CTLE, keyed by its settings.
    ctle_memo: Mutex<CtleMemo>,
    sink: Arc<dyn SeriesSink>,
}

impl TuningSession {
    /// Validate `config`, compute the channel and seed both tunings from it.
    ///
    /// `importer` is only consulted when the channel comes from a file.
    pub fn new(
        config: LinkConfig,
        importer: Option<&dyn WaveformImporter>,
        sink: Arc<dyn SeriesSink>,
    ) -> TuneResult<Self> {
        config.validate()?;
        let grid = SimulationGrid::from_params(&config.simulation)?;
        let channel = ChannelModel::from_config(&config).compute(&grid, importer)?;
        let synth = EqualizerSynthesizer::new(&grid, channel.impulse.len())?;
        let tuning = config.initial_tuning();

        info!(
            npts = grid.npts(),
            nspui = grid.nspui,
            channel_len = channel.impulse.len(),
            modulation = %config.simulation.modulation,
            "tuning session ready"
        );

        Ok(Self {
            config,
            grid,
            channel,
            synth,
            live: Mutex::new(tuning.clone()),
            committed: Mutex::new(tuning),
            ctle_memo: Mutex::new(None),
            sink,
        })
    }

    /// Session reading channel files as CSV and discarding plot series.
    pub fn open(config: LinkConfig) -> TuneResult<Self> {
        Self::new(config, Some(&CsvImporter), Arc::new(NullSink))
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    pub fn grid(&self) -> &SimulationGrid {
        &self.grid
    }

    pub fn channel(&self) -> &ChannelResponse {
        &self.channel
    }

    /// Snapshot of the live tuning.
    pub fn tuning(&self) -> EqTuning {
        self.live.lock_recover().clone()
    }

    /// Snapshot of the committed tuning.
    pub fn committed(&self) -> EqTuning {
        self.committed.lock_recover().clone()
    }

    /// Mutate the live tuning under its lock.
    pub fn update_tuning<R>(&self, f: impl FnOnce(&mut EqTuning) -> R) -> R {
        f(&mut self.live.lock_recover())
    }

    /// Combined Tx FFE, channel and Rx CTLE impulse response for `tuning`.
    pub fn combined_response(&self, tuning: &EqTuning) -> TuneResult<ImpulseResponse> {
        let ffe = self.synth.ffe(&tuning.tx_taps);
        let ctle = self.ctle(&tuning.ctle)?;
        Ok(compose(&ffe, &self.channel.impulse, &ctle)?)
    }

    /// Score `tuning` and publish its pulse and clock series.
    pub fn evaluate(&self, tuning: &EqTuning) -> TuneResult<CostState> {
        let h = self.combined_response(tuning)?;
        let evaluator = CostEvaluator::new(self.grid.nspui, self.config.simulation.modulation, tuning.dfe);
        let state = evaluator.evaluate_and_publish(&h.samples, self.sink.as_ref());
        debug!(
            cost = state.cost,
            isi = state.isi,
            main_cursor = state.main_cursor,
            "evaluated tuning"
        );
        Ok(state)
    }

    /// Cost of the live tuning.
    pub fn cost(&self) -> TuneResult<f64> {
        Ok(self.evaluate(&self.tuning())?.cost)
    }

    /// Relative optimality of the live tuning (`-cost`).
    pub fn rel_opt(&self) -> TuneResult<f64> {
        Ok(-self.cost()?)
    }

    pub fn set_ctle_peak_mag(&self, peak_mag_db: f64) -> TuneResult<()> {
        ConfigError::check_range(
            "CTLE peak magnitude",
            peak_mag_db,
            0.0,
            self.config.optimizer.max_ctle_peak_db,
        )?;
        self.update_tuning(|t| t.ctle.peak_mag_db = peak_mag_db);
        Ok(())
    }

    /// Set the value of Tx tuner `index`, checked against its bounds.
    pub fn set_tap_value(&self, index: usize, value: f64) -> TuneResult<()> {
        self.update_tuning(|t| -> TuneResult<()> {
            let len = t.tx_taps.len();
            let tap = t
                .tx_taps
                .get_mut(index)
                .ok_or(TuneError::NoSuchTap { index, len })?;
            ConfigError::check_range(&tap.name, value, tap.min_val, tap.max_val)?;
            tap.value = value;
            Ok(())
        })
    }

    /// Turn the DFE assumption on or off.
    ///
    /// A change also flips the post-cursor Tx taps: they are enabled when
    /// the DFE is off and disabled when it is on.
    pub fn set_use_dfe(&self, enabled: bool) {
        self.update_tuning(|t| {
            if t.dfe.enabled == enabled {
                return;
            }
            t.dfe.enabled = enabled;
            for tap in t.tx_taps.iter_mut().take(POST_TAPS.end).skip(POST_TAPS.start) {
                tap.enabled = !enabled;
            }
        });
        debug!(enabled, "DFE assumption changed");
    }

    /// Discard live changes: committed -> live.
    pub fn reset_eq(&self) {
        let committed = self.committed();
        *self.live.lock_recover() = committed;
    }

    /// Keep live changes: live -> committed.
    pub fn save_eq(&self) {
        let live = self.tuning();
        *self.committed.lock_recover() = live;
    }

    fn ctle(&self, settings: &CtleSettings) -> TuneResult<Arc<ImpulseResponse>> {
        if let Some((key, h)) = self.ctle_memo.lock_recover().as_ref() {
            if key == settings {
                return Ok(Arc::clone(h));
            }
        }
        let h = Arc::new(self.synth.ctle(settings)?);
        *self.ctle_memo.lock_recover() = Some((*settings, Arc::clone(&h)));
        Ok(h)
    }
}

impl std::fmt::Debug for TuningSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TuningSession")
            .field("grid", &self.grid)
            .field("channel_len", &self.channel.impulse.len())
            .field("live", &self.tuning())
            .finish()
    }
}
