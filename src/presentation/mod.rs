// Released under MIT License.
// Copyright (c) 2024-2025 Ladislav Bartos

//! This module contains functions for writing and reading the results of the clustering.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use serde::{de::DeserializeOwned, Serialize};

use crate::{errors::WriteError, MICROSTATES_VERSION};

/// Back up an output file, if it is necessary and if it is requested.
pub(crate) fn try_backup_file(
    filename: &impl AsRef<Path>,
    overwrite: bool,
    file_type: &str,
) -> Result<(), WriteError> {
    if filename.as_ref().exists() {
        if !overwrite {
            log::warn!(
                "Output {} file '{}' already exists. Backing it up.",
                file_type,
                filename.as_ref().to_string_lossy()
            );
            backitup::backup(filename.as_ref())
                .map_err(|_| WriteError::CouldNotBackupFile(Box::from(filename.as_ref())))?;
        } else {
            log::warn!(
                "Output {} file '{}' already exists. It will be overwritten as requested.",
                file_type,
                filename.as_ref().to_string_lossy()
            );
        }
    }

    Ok(())
}

/// Create a new file for writing.
pub(crate) fn create_and_open_file(
    filename: &impl AsRef<Path>,
) -> Result<BufWriter<File>, WriteError> {
    let file = File::create(filename.as_ref())
        .map_err(|_| WriteError::CouldNotCreateFile(Box::from(filename.as_ref())))?;

    Ok(BufWriter::new(file))
}

/// Serialize a value into a yaml file with a short header.
pub(crate) fn write_yaml<T: Serialize + ?Sized>(
    filename: impl AsRef<Path>,
    value: &T,
    overwrite: bool,
    file_type: &str,
) -> Result<(), WriteError> {
    try_backup_file(&filename, overwrite, file_type)?;
    let mut writer = create_and_open_file(&filename)?;

    writeln!(writer, "# Generated with microstates v{}", MICROSTATES_VERSION)
        .map_err(|_| WriteError::CouldNotWriteYaml(Box::from(filename.as_ref())))?;

    serde_yaml::to_writer(&mut writer, value)
        .map_err(|_| WriteError::CouldNotWriteYaml(Box::from(filename.as_ref())))?;

    writer
        .flush()
        .map_err(|_| WriteError::CouldNotWriteYaml(Box::from(filename.as_ref())))?;

    log::info!(
        "Written {} into '{}'.",
        file_type,
        filename.as_ref().to_string_lossy()
    );
    Ok(())
}

/// Read a value from a yaml file.
pub(crate) fn read_yaml<T: DeserializeOwned>(filename: impl AsRef<Path>) -> Result<T, WriteError> {
    let file = File::open(filename.as_ref())
        .map_err(|_| WriteError::CouldNotReadFile(Box::from(filename.as_ref())))?;

    serde_yaml::from_reader(BufReader::new(file))
        .map_err(|e| WriteError::CouldNotParseYaml(Box::from(filename.as_ref()), e))
}
