use bon::Builder;

/// Storage root the host serves uploaded files from.
pub const DEFAULT_ASSET_SOURCE: &str = "data";

/// Settings for one import.
///
/// ```
/// use oggimport::ImportOptions;
///
/// let options = ImportOptions::builder().world_id("my-world").build();
/// assert_eq!(options.portrait_dir(), "worlds/my-world/images/characters");
/// ```
#[derive(Clone, Builder, Debug)]
pub struct ImportOptions {
    /// The host world the character is imported into.
    #[builder(into)]
    world_id: String,
    /// Storage root passed to the asset host.
    #[builder(into, default = DEFAULT_ASSET_SOURCE.to_string())]
    asset_source: String,
    /// Update an existing record leaf by leaf instead of replacing it.
    #[builder(default)]
    partial_update: bool,
    /// Overrides the per-world portrait directory.
    #[builder(into)]
    portrait_dir: Option<String>,
}

impl ImportOptions {
    pub fn world_id(&self) -> &str {
        &self.world_id
    }

    pub fn asset_source(&self) -> &str {
        &self.asset_source
    }

    pub fn partial_update(&self) -> bool {
        self.partial_update
    }

    /// Where portraits are uploaded.
    pub fn portrait_dir(&self) -> String {
        match &self.portrait_dir {
            Some(dir) => dir.clone(),
            None => format!("worlds/{}/images/characters", self.world_id),
        }
    }
}
