/// Double-Option deserializer for PATCH-style payloads.
///
/// With a plain `Option<Option<T>>` field serde collapses an explicit JSON
/// null into "field absent". Routing through this module keeps the
/// distinction: absent => `None`, null => `Some(None)`, value => `Some(Some)`.
pub mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(de).map(Some)
    }
}
