//! Uid command implementation.

use entimodel_core::{Model, ModelFile, UidGenerator};
use std::path::Path;

/// Runs the uid command.
///
/// Prints a uid that is not used anywhere in the model, retired uids
/// included. The model file is locked while reading but never written.
pub fn run(model_path: &Path, seed: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let uids = UidGenerator::from_optional_seed(seed);
    let mut model = if model_path.exists() {
        let mut file = ModelFile::open(model_path, false)?;
        file.load()?.unwrap_or_default()
    } else {
        Model::default()
    };
    model.set_uid_generator(uids);

    println!("{}", model.generate_uid()?);
    Ok(())
}
