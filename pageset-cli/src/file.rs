//! Store file functions
//!
//! The file has the following structure
//!
//! Header
//! Free list page image
//!
//! The Header is padded to HEADER_SIZE and holds the format version, the list configuration
//! and the size of the page image which follows it.

use std::io::SeekFrom;
use std::path::Path;

use anyhow::Result;
use bincode::Options;
use pageset::idl::IdlConfig;
use pageset::Idl;
use pageset::BINCODER;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

const HEADER_SIZE: u64 = 512;

const FORMAT_VERSION_1: u8 = 1;

const SUPPORTED_VERSIONS: &[u8] = &[FORMAT_VERSION_1];

#[derive(Debug)]
pub(crate) struct StoreFile {
    file: File,
    header: StoreFileHeader,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFileHeader {
    version: u8,
    config: IdlConfig,
    image_size: u64,
}

#[derive(Error, Debug)]
pub enum StoreFileError {
    #[error("file version not supported: {0}")]
    InvalidFileVersion(u8),
    #[error("page image of {0} bytes extends past end of file")]
    TruncatedImage(u64),
}

impl StoreFile {
    pub(crate) async fn try_open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(false)
            .open(path)
            .await?;

        let header = StoreFile::read_header(&mut file).await?;

        if !SUPPORTED_VERSIONS.contains(&header.version) {
            return Err(StoreFileError::InvalidFileVersion(header.version).into());
        }

        Ok(Self { file, header })
    }

    pub(crate) async fn try_new(path: &Path, config: IdlConfig) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;

        let mut this = Self {
            file,
            header: StoreFileHeader {
                version: FORMAT_VERSION_1,
                config,
                image_size: 0,
            },
        };
        this.write_list(&Idl::with_config(config)?).await?;
        Ok(this)
    }

    pub(crate) fn config(&self) -> IdlConfig {
        self.header.config
    }

    pub(crate) async fn flush(&self) -> Result<()> {
        self.file.sync_all().await.map_err(|e| e.into())
    }

    pub(crate) async fn read_list(&mut self) -> Result<Idl> {
        let len = self.file.metadata().await?.len();
        if HEADER_SIZE + self.header.image_size > len {
            return Err(StoreFileError::TruncatedImage(self.header.image_size).into());
        }
        let mut buf = vec![0; self.header.image_size as usize];
        self.file.seek(SeekFrom::Start(HEADER_SIZE)).await?;
        self.file.read_exact(&mut buf).await?;
        Idl::decode(&buf, self.header.config)
    }

    pub(crate) async fn write_list(&mut self, idl: &Idl) -> Result<()> {
        let image = idl.encode()?;
        self.header.image_size = image.len() as u64;
        self.file.set_len(HEADER_SIZE + self.header.image_size).await?;

        let s_header = BINCODER.serialize(&self.header)?;
        self.file.seek(SeekFrom::Start(0)).await?;
        self.file.write_all(&s_header).await?;

        self.file.seek(SeekFrom::Start(HEADER_SIZE)).await?;
        self.file.write_all(&image).await?;
        tracing::debug!(bytes = image.len(), "wrote free list");
        Ok(())
    }

    async fn read_header(file: &mut File) -> Result<StoreFileHeader> {
        let mut buf = vec![0; HEADER_SIZE as usize];

        file.seek(SeekFrom::Start(0)).await?;
        file.read_exact(&mut buf).await?;

        BINCODER.deserialize(&buf).map_err(|e| e.into())
    }
}
