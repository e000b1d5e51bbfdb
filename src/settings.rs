//! Persistent viewer settings.
//!
//! Settings are a single JSON document. Each persisted object implements [`Restorable`]
//! and is stored under its [`Restorable::id`].

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::Path;

/// Default file the viewer stores its settings in.
pub const SETTINGS_FILE: &str = "settings.json";

/// An object whose state can be written to and read back from the settings document.
pub trait Restorable {
    /// Key the state is stored under.
    fn id(&self) -> &'static str;

    /// The state as a JSON object.
    fn state(&self) -> Value;

    /// Restores the fields present in `settings`.
    ///
    /// Anything that is not an object is ignored, as are missing keys.
    fn restore(&mut self, settings: &Value);

    /// The state wrapped as `{ id: state }`.
    fn save(&self) -> Value {
        let mut json = Map::new();
        let _ = json.insert(self.id().to_string(), self.state());
        Value::Object(json)
    }
}

/// Overlays the keys of `settings` onto the serialized `current` value.
///
/// Returns `None` if `settings` is not an object or if the merged document does not
/// deserialize, in which case the caller keeps its current state.
pub fn merge_fields<T>(current: &T, settings: &Value) -> Option<T>
where
    T: Serialize + DeserializeOwned,
{
    let overrides = settings.as_object()?;
    let mut merged = serde_json::to_value(current).ok()?;

    if let Value::Object(fields) = &mut merged {
        for (key, value) in overrides {
            if fields.contains_key(key) {
                let _ = fields.insert(key.clone(), value.clone());
            }
        }
    }

    match serde_json::from_value(merged) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Ignoring malformed settings: {}", err);
            None
        }
    }
}

/// The settings document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Settings {
    root: Map<String, Value>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the document at `path`.
    ///
    /// A missing or empty file yields an empty document. A file that is not a JSON
    /// object is reported and replaced by an empty document.
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("No settings at {}; using defaults.", path.display());
                return Ok(Self::new());
            }
            Err(err) => return Err(err),
        };

        if text.trim().is_empty() {
            return Ok(Self::new());
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(root)) => Ok(Settings { root }),
            Ok(_) => {
                log::warn!("Settings file {} is not an object.", path.display());
                Ok(Self::new())
            }
            Err(err) => {
                log::warn!("Failed to parse {}: {}", path.display(), err);
                Ok(Self::new())
            }
        }
    }

    /// Writes the document to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        let text = serde_json::to_string_pretty(&self.root)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        fs::write(path, text)
    }

    pub fn section(&self, id: &str) -> Option<&Value> {
        self.root.get(id)
    }

    pub fn set_section(&mut self, id: &str, value: Value) {
        let _ = self.root.insert(id.to_string(), value);
    }

    /// Stores `object` under its id.
    pub fn store(&mut self, object: &dyn Restorable) {
        self.set_section(object.id(), object.state());
    }

    /// Restores `object` from its section, if present. Returns whether it was found.
    pub fn apply_to(&self, object: &mut dyn Restorable) -> bool {
        match self.section(object.id()) {
            Some(section) => {
                object.restore(section);
                true
            }
            None => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Knob {
        level: f32,
        label_text: String,
    }

    impl Restorable for Knob {
        fn id(&self) -> &'static str {
            "Knob"
        }

        fn state(&self) -> Value {
            serde_json::to_value(self).unwrap_or(Value::Null)
        }

        fn restore(&mut self, settings: &Value) {
            if let Some(restored) = merge_fields(self, settings) {
                *self = restored;
            }
        }
    }

    fn knob() -> Knob {
        Knob {
            level: 0.5,
            label_text: "gain".to_string(),
        }
    }

    #[test]
    fn missing_keys_keep_their_values() {
        let mut knob = knob();
        knob.restore(&json!({ "level": 0.75 }));
        assert_eq!(knob.level, 0.75);
        assert_eq!(knob.label_text, "gain");
    }

    #[test]
    fn non_objects_are_ignored() {
        let mut knob = knob();
        knob.restore(&json!([1, 2, 3]));
        knob.restore(&json!(null));
        assert_eq!(knob, self::knob());
    }

    #[test]
    fn malformed_values_are_ignored() {
        let mut knob = knob();
        knob.restore(&json!({ "level": "loud" }));
        assert_eq!(knob, self::knob());
    }

    #[test]
    fn save_wraps_the_state_in_its_id() {
        assert_eq!(
            knob().save(),
            json!({ "Knob": { "level": 0.5, "labelText": "gain" } })
        );
    }

    #[test]
    fn documents_round_trip_through_a_file() {
        let path = std::env::temp_dir().join(format!("modelview-settings-{}.json", std::process::id()));
        let mut settings = Settings::new();
        settings.store(&knob());
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        let mut restored = Knob {
            level: 0.0,
            label_text: String::new(),
        };
        assert!(loaded.apply_to(&mut restored));
        assert_eq!(restored, knob());
    }

    #[test]
    fn missing_file_is_an_empty_document() {
        let settings = Settings::load(Path::new("/nonexistent/modelview/settings.json")).unwrap();
        assert!(settings.is_empty());
    }
}
