//! Durable snapshots of the session and archive.
//!
//! A snapshot is one JSON document under a single key:
//!
//! ```text
//! { "version": 1, "session": { .. }, "archive": [ .. ] }
//! ```
//!
//! Documents written by older releases are brought up to date by the
//! [`MIGRATIONS`] chain before they are deserialized.

use crate::{ledger::round_cm, BatchArchive, LotbookError, Method, SessionState};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

/// Key the snapshot is stored under.
pub const STATE_KEY: &str = "tree-height-session";

/// Key of the field app's unversioned blob, read when [`STATE_KEY`]
/// holds nothing.
pub const LEGACY_KEY: &str = "medicionAlturasCamara";

/// Version written by this release.
pub const SNAPSHOT_VERSION: u64 = 1;

/// One step of the migration chain. Entry `n` upgrades a version `n`
/// document to version `n + 1`.
pub type Migration = fn(Value) -> Result<Value, LotbookError>;

pub const MIGRATIONS: &[Migration] = &[migrate_v0];

/// String-keyed slots holding whole documents.
pub trait SlotStore {
    /// Returns `None` when nothing was ever written under `key`.
    fn read(&self, key: &str) -> Result<Option<String>, LotbookError>;

    fn write(&mut self, key: &str, value: &str) -> Result<(), LotbookError>;
}

/// Slots kept in memory, for tests and throwaway sessions.
#[derive(Debug, Default, Clone)]
pub struct MemorySlots {
    slots: HashMap<String, String>,
}

impl MemorySlots {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlotStore for MemorySlots {
    fn read(&self, key: &str) -> Result<Option<String>, LotbookError> {
        Ok(self.slots.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), LotbookError> {
        self.slots.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per slot in a directory.
#[derive(Debug, Clone)]
pub struct FileSlots {
    dir: PathBuf,
}

impl FileSlots {
    /// Opens `dir`, creating it if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, LotbookError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!("slots dir: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SlotStore for FileSlots {
    fn read(&self, key: &str) -> Result<Option<String>, LotbookError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes beside the target then renames over it, so a crash
    /// leaves either the old or the new document.
    fn write(&mut self, key: &str, value: &str) -> Result<(), LotbookError> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Everything restored at start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub session: SessionState,

    #[serde(default)]
    pub archive: BatchArchive,
}

#[derive(Serialize)]
struct Versioned<'a> {
    version: u64,
    session: &'a SessionState,
    archive: &'a BatchArchive,
}

/// Reads and writes [`Snapshot`]s through a [`SlotStore`].
pub struct PersistenceStore<S> {
    slots: S,
    key: String,
}

impl<S: SlotStore> PersistenceStore<S> {
    pub fn new(slots: S) -> Self {
        Self::with_key(slots, STATE_KEY)
    }

    pub fn with_key(slots: S, key: &str) -> Self {
        Self {
            slots,
            key: key.to_string(),
        }
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    pub fn has_snapshot(&self) -> Result<bool, LotbookError> {
        Ok(self.read_raw()?.is_some())
    }

    fn read_raw(&self) -> Result<Option<String>, LotbookError> {
        match self.slots.read(&self.key)? {
            Some(raw) => Ok(Some(raw)),
            None => {
                let legacy = self.slots.read(LEGACY_KEY)?;
                if legacy.is_some() {
                    info!("reading legacy snapshot under {LEGACY_KEY}");
                }
                Ok(legacy)
            }
        }
    }

    pub fn save(
        &mut self,
        session: &SessionState,
        archive: &BatchArchive,
    ) -> Result<(), LotbookError> {
        let doc = Versioned {
            version: SNAPSHOT_VERSION,
            session,
            archive,
        };
        self.slots.write(&self.key, &serde_json::to_string(&doc)?)?;
        debug!("saved snapshot under {}", self.key);
        Ok(())
    }

    /// Reads the stored snapshot, or the default one when nothing was
    /// stored yet.
    pub fn load(&self) -> Result<Snapshot, LotbookError> {
        let Some(raw) = self.read_raw()? else {
            debug!("no snapshot under {}", self.key);
            return Ok(Snapshot::default());
        };
        let doc: Value = serde_json::from_str(&raw)?;
        Ok(serde_json::from_value(migrate(doc)?)?)
    }
}

/// Runs `doc` through every migration from its version up.
///
/// A document without a `version` field is version 0, the field
/// app's blob.
pub fn migrate(mut doc: Value) -> Result<Value, LotbookError> {
    if !doc.is_object() {
        return Err(LotbookError::Malformed("snapshot is not an object".into()));
    }
    let version = match doc.get("version") {
        None => 0,
        Some(v) => v
            .as_u64()
            .ok_or_else(|| LotbookError::Malformed(format!("version {v}")))?,
    };
    if version > SNAPSHOT_VERSION {
        return Err(LotbookError::UnsupportedVersion(version));
    }
    let start = usize::try_from(version).unwrap_or(usize::MAX);
    for (from, step) in MIGRATIONS.iter().enumerate().skip(start) {
        info!("migrating snapshot v{from} -> v{}", from + 1);
        doc = step(doc)?;
    }
    Ok(doc)
}

/// Version 0 is the unversioned blob the field app kept under
/// [`LEGACY_KEY`], with Spanish field names:
///
/// ```text
/// { loteActual, arbolActual, tipoActual, distanciaActual,
///   calibracionAngulo, anguloActual, alturaOjo,
///   segmentosTemporales: [segmento], medicionesGuardadas: [medicion],
///   lotesGuardados: [{ nombre, mediciones, fecha }] }
/// ```
///
/// Numbers may appear as decimal strings (`alturaTotal`, `angulo`).
/// Measurements in `medicionesGuardadas` belong to `loteActual` and
/// are dropped when no lot was open.
fn migrate_v0(doc: Value) -> Result<Value, LotbookError> {
    let mut session = Map::new();
    let active = doc
        .get("loteActual")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty());
    if let Some(name) = active {
        let mut lot = Map::new();
        lot.insert("name".into(), name.into());
        lot.insert(
            "tree_measurements".into(),
            legacy_list(doc.get("medicionesGuardadas"), legacy_measurement)?,
        );
        session.insert("active_lot".into(), lot.into());
    }
    if let Some(tree) = doc.get("arbolActual").and_then(legacy_count) {
        session.insert("active_tree".into(), tree.into());
    }
    if let Some(tipo) = doc.get("tipoActual") {
        session.insert("active_method".into(), legacy_method(tipo)?);
    }
    for (from, to) in [
        ("distanciaActual", "active_distance"),
        ("calibracionAngulo", "calibration_offset"),
        ("anguloActual", "current_angle"),
        ("alturaOjo", "eye_height"),
    ] {
        if let Some(n) = doc.get(from).and_then(legacy_number) {
            session.insert(to.into(), n.into());
        }
    }
    session.insert(
        "ledger".into(),
        legacy_segments(doc.get("segmentosTemporales"))?,
    );

    let mut out = Map::new();
    out.insert("version".into(), Value::from(1u64));
    out.insert("session".into(), session.into());
    out.insert(
        "archive".into(),
        legacy_list(doc.get("lotesGuardados"), legacy_lot)?,
    );
    Ok(out.into())
}

fn legacy_lot(lote: &Value) -> Result<Value, LotbookError> {
    let name = lote
        .get("nombre")
        .and_then(Value::as_str)
        .ok_or_else(|| LotbookError::Malformed("saved lot without nombre".into()))?;
    let mut lot = Map::new();
    lot.insert("name".into(), name.into());
    lot.insert(
        "tree_measurements".into(),
        legacy_list(lote.get("mediciones"), legacy_measurement)?,
    );
    if let Some(fecha) = lote.get("fecha").filter(|f| f.is_string()) {
        lot.insert("saved_at".into(), fecha.clone());
    }
    Ok(lot.into())
}

fn legacy_measurement(medicion: &Value) -> Result<Value, LotbookError> {
    let required = |field: &str| {
        medicion
            .get(field)
            .ok_or_else(|| LotbookError::Malformed(format!("measurement without {field}")))
    };
    let tree = legacy_count(required("arbol")?)
        .ok_or_else(|| LotbookError::Malformed("measurement arbol".into()))?;
    let total = legacy_number(required("alturaTotal")?)
        .ok_or_else(|| LotbookError::Malformed("measurement alturaTotal".into()))?;
    let distance = legacy_number(required("distancia")?)
        .ok_or_else(|| LotbookError::Malformed("measurement distancia".into()))?;

    let mut m = Map::new();
    m.insert("tree_number".into(), tree.into());
    m.insert("method".into(), legacy_method(required("tipo")?)?);
    m.insert("segments".into(), legacy_segments(medicion.get("segmentos"))?);
    m.insert("total_height".into(), round_cm(total).into());
    m.insert("distance".into(), distance.into());
    m.insert("timestamp".into(), required("fecha")?.clone());
    Ok(m.into())
}

/// Segments are renumbered by position and lengths recomputed, since
/// the app let operators type segment numbers by hand.
fn legacy_segments(segmentos: Option<&Value>) -> Result<Value, LotbookError> {
    let Some(segmentos) = segmentos else {
        return Ok(Value::Array(Vec::new()));
    };
    let segmentos = segmentos
        .as_array()
        .ok_or_else(|| LotbookError::Malformed("segmentos is not a list".into()))?;
    let mut floor = 0.0;
    let mut out = Vec::with_capacity(segmentos.len());
    for (i, segmento) in segmentos.iter().enumerate() {
        let height = segmento
            .get("alturaAcumulada")
            .and_then(legacy_number)
            .ok_or_else(|| LotbookError::Malformed(format!("segment {} height", i + 1)))?;
        let method = match segmento.get("metodo").and_then(Value::as_str) {
            Some("camera") => "sensor",
            _ => "manual",
        };
        let mut seg = Map::new();
        seg.insert("index".into(), (i + 1).into());
        seg.insert("cumulative_height".into(), height.into());
        seg.insert("length".into(), round_cm(height - floor).into());
        seg.insert("capture_method".into(), method.into());
        if let Some(angle) = segmento.get("angulo").and_then(legacy_number) {
            seg.insert("angle".into(), angle.into());
        }
        if let Some(distance) = segmento.get("distancia").and_then(legacy_number) {
            seg.insert("distance".into(), distance.into());
        }
        out.push(seg.into());
        floor = height;
    }
    Ok(Value::Array(out))
}

fn legacy_list<F>(list: Option<&Value>, convert: F) -> Result<Value, LotbookError>
where
    F: Fn(&Value) -> Result<Value, LotbookError>,
{
    match list {
        None | Some(Value::Null) => Ok(Value::Array(Vec::new())),
        Some(Value::Array(items)) => items
            .iter()
            .map(convert)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Some(other) => Err(LotbookError::Malformed(format!("expected a list, got {other}"))),
    }
}

/// The app's method labels, plus the current ones.
fn legacy_method(tipo: &Value) -> Result<Value, LotbookError> {
    let method = match tipo.as_str().map(str::trim) {
        Some("India" | "MethodA") => Method::MethodA,
        Some("265" | "MethodB") => Method::MethodB,
        _ if tipo.as_u64() == Some(265) => Method::MethodB,
        _ => return Err(LotbookError::Malformed(format!("method {tipo}"))),
    };
    Ok(method.as_str().into())
}

/// A finite number, or a string holding one.
fn legacy_number(v: &Value) -> Option<f64> {
    v.as_f64()
        .or_else(|| v.as_str()?.trim().parse().ok())
        .filter(|n: &f64| n.is_finite())
}

fn legacy_count(v: &Value) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_str()?.trim().parse().ok())
        .filter(|n| *n > 0)
}
