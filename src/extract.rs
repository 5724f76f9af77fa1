use crate::config::ExplorerConfig;
use crate::error::IngestError;
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, IngestError> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = fs::read(path).map_err(|err| IngestError::Read {
            name: path.display().to_string(),
            reason: err.to_string(),
        })?;
        Ok(Self { name, bytes })
    }

    pub fn collect(paths: &[PathBuf]) -> Result<Vec<Self>, IngestError> {
        let mut files = Vec::new();
        for path in paths {
            if !path.is_dir() {
                files.push(Self::from_path(path)?);
                continue;
            }

            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(err) => {
                        log::warn!("skipping unreadable path under {}: {err}", path.display());
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect();
            found.sort();
            for file in found {
                files.push(Self::from_path(&file)?);
            }
        }
        Ok(files)
    }
}

#[derive(Debug, Clone)]
pub struct ParseTask {
    pub name: String,
    pub origin: String,
    content: Result<Vec<u8>, String>,
}

impl ParseTask {
    fn new(name: String, origin: String, content: Result<Vec<u8>, String>) -> Self {
        Self {
            name,
            origin,
            content,
        }
    }

    pub fn text(&self) -> Result<&str, String> {
        let bytes = self.content.as_ref().map_err(Clone::clone)?;
        std::str::from_utf8(bytes).map_err(|err| format!("content is not valid UTF-8 text ({err})"))
    }
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub tasks: Vec<ParseTask>,
    pub warnings: Vec<String>,
}

pub fn extract(files: &[SourceFile], config: &ExplorerConfig) -> Result<Extraction, IngestError> {
    let mut extraction = Extraction::default();

    for file in files {
        let lower = file.name.to_lowercase();
        if file.bytes.len() as u64 > config.max_file_bytes {
            let max_mb = config.max_file_bytes / (1024 * 1024);
            push_warning(
                &mut extraction.warnings,
                format!(
                    "Skipping {}: file is larger than the {max_mb}MB limit.",
                    file.name
                ),
            );
        } else if lower.ends_with(".json") {
            log::debug!("queued json task {}", file.name);
            extraction.tasks.push(ParseTask::new(
                file.name.clone(),
                file.name.clone(),
                Ok(file.bytes.clone()),
            ));
        } else if lower.ends_with(".zip") {
            extract_archive(file, config, &mut extraction)?;
        } else {
            push_warning(
                &mut extraction.warnings,
                format!("Skipping unsupported file: {}", file.name),
            );
        }
    }

    if extraction.tasks.is_empty() {
        return Err(IngestError::NoTasks {
            folder: config.zip_folder.clone(),
            prefix: config.zip_file_prefix.clone(),
        });
    }

    Ok(extraction)
}

fn extract_archive(
    file: &SourceFile,
    config: &ExplorerConfig,
    extraction: &mut Extraction,
) -> Result<(), IngestError> {
    let mut archive =
        ZipArchive::new(Cursor::new(file.bytes.as_slice())).map_err(|err| IngestError::Archive {
            name: file.name.clone(),
            reason: err.to_string(),
        })?;

    let folder_prefix = format!("{}/", config.zip_folder);
    let mut folder_found = false;
    let mut tasks = Vec::new();

    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(err) => {
                push_warning(
                    &mut extraction.warnings,
                    format!("Failed to read entry {index} of {}: {err}", file.name),
                );
                continue;
            }
        };

        let Some(relative) = entry.name().strip_prefix(&folder_prefix) else {
            continue;
        };
        folder_found = true;
        if entry.is_dir() {
            continue;
        }

        let base_name = relative.rsplit('/').next().unwrap_or(relative).to_string();
        if !base_name.starts_with(&config.zip_file_prefix) || !base_name.ends_with(".json") {
            continue;
        }

        let declared = entry.size();
        let content = read_entry(&mut entry, declared, config.max_file_bytes);
        log::debug!("queued archive task {base_name} from {}", file.name);
        tasks.push(ParseTask::new(base_name, file.name.clone(), content));
    }

    if !folder_found {
        push_warning(
            &mut extraction.warnings,
            format!(
                "File {} is missing the \"{}\" folder.",
                file.name, config.zip_folder
            ),
        );
    } else if tasks.is_empty() {
        push_warning(
            &mut extraction.warnings,
            format!(
                "No streaming history files found inside {}. Expected files named \"{}*.json\".",
                file.name, config.zip_file_prefix
            ),
        );
    }

    extraction.tasks.append(&mut tasks);
    Ok(())
}

pub(crate) fn push_warning(warnings: &mut Vec<String>, warning: String) {
    log::warn!("{warning}");
    warnings.push(warning);
}

fn read_entry(entry: &mut impl Read, declared: u64, limit: u64) -> Result<Vec<u8>, String> {
    let too_large = || format!("entry is larger than the {}MB limit", limit / (1024 * 1024));
    if declared > limit {
        return Err(too_large());
    }
    let mut bytes = Vec::new();
    entry
        .by_ref()
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|err| format!("failed to decompress entry ({err})"))?;
    if bytes.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(bytes)
}
