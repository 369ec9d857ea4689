use crate::{
    export, BatchArchive, CsvExport, LoadedLot, Lot, LotSummary, LotbookError, Method,
    PersistenceStore, SaveOutcome, Segment, SessionConfig, SessionState, SlotStore,
    TreeMeasurement,
};
use chrono::Utc;
use clinometer::{Acquired, AngleSample, AngleSource, Camera};
use log::{debug, info};

/// Command surface over the session and archive.
///
/// Every mutating command runs against a copy of the session and
/// archive. The copy replaces the live model only once the
/// [`PersistenceStore`] has written it, so a command that fails,
/// whether on validation or on the write, changes nothing.
pub struct Controller<S> {
    config: SessionConfig,
    state: SessionState,
    archive: BatchArchive,
    store: PersistenceStore<S>,
}

impl<S: SlotStore> Controller<S> {
    /// Restores the last snapshot from `slots`, or starts a fresh
    /// session with `config` if there is none.
    pub fn open(slots: S, config: SessionConfig) -> Result<Self, LotbookError> {
        config.validate()?;
        let store = PersistenceStore::new(slots);
        let (state, archive) = if store.has_snapshot()? {
            let snapshot = store.load()?;
            debug!(
                "restored session; lots archived: {}",
                snapshot.archive.len()
            );
            (snapshot.session, snapshot.archive)
        } else {
            (SessionState::new(config), BatchArchive::new())
        };
        Ok(Self {
            config,
            state,
            archive,
            store,
        })
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn archive(&self) -> &BatchArchive {
        &self.archive
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn store(&self) -> &PersistenceStore<S> {
        &self.store
    }

    /// Writes the current session and archive.
    pub fn persist(&mut self) -> Result<(), LotbookError> {
        self.store.save(&self.state, &self.archive)
    }

    /// Runs `command` on copies of the model, writes them and only
    /// then installs them.
    fn apply<T, F>(&mut self, command: F) -> Result<T, LotbookError>
    where
        F: FnOnce(&mut SessionState, &mut BatchArchive) -> Result<T, LotbookError>,
    {
        let mut state = self.state.clone();
        let mut archive = self.archive.clone();
        let out = command(&mut state, &mut archive)?;
        self.store.save(&state, &archive)?;
        self.state = state;
        self.archive = archive;
        Ok(out)
    }
}

/// Sensor path.
impl<S: SlotStore> Controller<S> {
    /// Feeds one sample and returns the live height.
    ///
    /// Not persisted: samples arrive many times a second. The latest
    /// angle reaches the store with the next mutating command.
    pub fn observe(&mut self, sample: AngleSample) -> f64 {
        self.state.observe(sample)
    }

    /// Zeroes the current line of sight. Returns the new offset.
    pub fn calibrate(&mut self) -> Result<f64, LotbookError> {
        let offset = self.apply(|state, _| Ok(state.calibrate()))?;
        info!("calibrated; offset: {offset:.1}");
        Ok(offset)
    }

    /// Holds `source` for as long as it takes to drain its pending
    /// samples, then calibrates on the last one.
    pub fn calibrate_from<A: AngleSource + ?Sized>(
        &mut self,
        source: &mut A,
    ) -> Result<f64, LotbookError> {
        let offset = self.apply(|state, _| {
            drain(state, source)?;
            Ok(state.calibrate())
        })?;
        info!("calibrated; offset: {offset:.1}");
        Ok(offset)
    }

    pub fn capture_sensor(&mut self) -> Result<Segment, LotbookError> {
        self.apply(|state, _| state.capture_sensor().cloned())
    }

    /// Acquires `source`, drains its pending samples and captures the
    /// resulting sensor height. The source is released on every path.
    pub fn capture_from<A: AngleSource + ?Sized>(
        &mut self,
        source: &mut A,
    ) -> Result<Segment, LotbookError> {
        self.apply(|state, _| {
            drain(state, source)?;
            state.capture_sensor().cloned()
        })
    }

    /// Like [`Controller::capture_from`] with the camera preview running.
    pub fn capture_with_camera<C, A>(
        &mut self,
        camera: &mut C,
        source: &mut A,
    ) -> Result<Segment, LotbookError>
    where
        C: Camera + ?Sized,
        A: AngleSource + ?Sized,
    {
        let _preview = Acquired::new(camera)?;
        self.capture_from(source)
    }
}

/// Feeds every pending sample of `source` into `state`.
fn drain<A: AngleSource + ?Sized>(
    state: &mut SessionState,
    source: &mut A,
) -> Result<(), LotbookError> {
    let mut sensor = Acquired::new(source)?;
    let mut count = 0;
    while let Some(sample) = sensor.poll() {
        state.observe(sample);
        count += 1;
    }
    debug!("{}: {count} samples", sensor.name());
    Ok(())
}

/// Ledger and workflow.
impl<S: SlotStore> Controller<S> {
    /// Starts a lot with the configured eye height.
    pub fn new_lot(&mut self, name: &str) -> Result<Lot, LotbookError> {
        let eye_height = self.config.eye_height;
        self.apply(|state, _| {
            state.set_eye_height(eye_height);
            state.new_lot(name).cloned()
        })
    }

    pub fn capture_manual(&mut self, height: f64) -> Result<Segment, LotbookError> {
        self.apply(|state, _| state.capture_manual(height).cloned())
    }

    pub fn edit_segment(&mut self, position: usize, height: f64) -> Result<Segment, LotbookError> {
        self.apply(|state, _| state.edit_segment(position, height).cloned())
    }

    pub fn delete_segment(&mut self, position: usize) -> Result<Segment, LotbookError> {
        self.apply(|state, _| state.delete_segment(position))
    }

    pub fn commit_measurement(&mut self) -> Result<TreeMeasurement, LotbookError> {
        let now = Utc::now();
        self.apply(|state, _| state.commit_measurement(now))
    }

    pub fn advance_tree(&mut self) -> Result<u32, LotbookError> {
        self.apply(|state, _| state.advance_tree())
    }

    /// Returns the number of uncommitted segments discarded.
    pub fn change_tree(&mut self, number: u32) -> Result<usize, LotbookError> {
        self.apply(|state, _| state.change_tree(number))
    }

    pub fn change_method(&mut self, method: Method) -> Result<(), LotbookError> {
        self.apply(|state, _| {
            state.change_method(method);
            Ok(())
        })
    }

    pub fn change_distance(&mut self, meters: f64) -> Result<(), LotbookError> {
        self.apply(|state, _| state.change_distance(meters))
    }

    /// Resets the session to the configured defaults. Archived lots
    /// are kept.
    pub fn clear_all(&mut self) -> Result<(), LotbookError> {
        let config = self.config;
        self.apply(|state, _| {
            state.clear(config);
            Ok(())
        })?;
        info!("session cleared");
        Ok(())
    }
}

/// Archive and export.
impl<S: SlotStore> Controller<S> {
    /// Copies the active lot into the archive, replacing any lot of
    /// the same name.
    pub fn save_lot(&mut self) -> Result<SaveOutcome, LotbookError> {
        let now = Utc::now();
        self.apply(|state, archive| {
            let mut lot = state
                .active_lot()
                .ok_or(LotbookError::NoActiveLot)?
                .clone();
            lot.set_saved_at(now);
            state.mark_saved(now);
            info!("saving lot {}", lot.name());
            Ok(archive.save(lot))
        })
    }

    /// Makes an archived lot active, resuming after its highest tree.
    pub fn load_lot(&mut self, name: &str) -> Result<u32, LotbookError> {
        self.apply(|state, archive| {
            let LoadedLot {
                lot,
                next_tree_number,
            } = archive.load(name)?;
            info!("loaded lot {name} at tree {next_tree_number}");
            state.activate(lot, next_tree_number);
            Ok(next_tree_number)
        })
    }

    pub fn delete_lot(&mut self, position: usize) -> Result<Lot, LotbookError> {
        let lot = self.apply(|_, archive| archive.delete(position))?;
        info!("deleted lot {}", lot.name());
        Ok(lot)
    }

    pub fn delete_lot_named(&mut self, name: &str) -> Result<Lot, LotbookError> {
        let position = self
            .archive
            .position(name)
            .ok_or_else(|| LotbookError::NotFound(format!("lot {name:?}")))?;
        self.delete_lot(position)
    }

    pub fn list_lots(&self) -> Vec<LotSummary> {
        self.archive.list()
    }

    pub fn export_lot(&self) -> Result<CsvExport, LotbookError> {
        let lot = self.state.active_lot().ok_or(LotbookError::NoActiveLot)?;
        let today = Utc::now().date_naive();
        Ok(CsvExport {
            file_name: export::file_name(Some(lot.name()), today),
            contents: export::export_lot(lot)?,
        })
    }

    pub fn export_archive(&self) -> Result<CsvExport, LotbookError> {
        let today = Utc::now().date_naive();
        Ok(CsvExport {
            file_name: export::file_name(None, today),
            contents: export::export_archive(&self.archive, self.state.active_lot(), today)?,
        })
    }
}
