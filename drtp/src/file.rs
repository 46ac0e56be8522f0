//! File source and sink: fixed-size chunking and contiguous reassembly.

use std::io;
use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::packet::MAX_PAYLOAD;

/// Split `data` into chunks of at most [`MAX_PAYLOAD`] bytes.
///
/// An empty input yields no chunks.
pub fn split_chunks(data: &[u8]) -> Vec<Vec<u8>> {
    data.chunks(MAX_PAYLOAD).map(<[u8]>::to_vec).collect()
}

/// Read the whole file at `path` and split it for transmission.
pub async fn read_chunks(path: impl AsRef<Path>) -> io::Result<Vec<Vec<u8>>> {
    let data = tokio::fs::read(path).await?;
    Ok(split_chunks(&data))
}

/// Create or truncate `path` and write `chunks` back to back.
pub async fn write_chunks(path: impl AsRef<Path>, chunks: &[Vec<u8>]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    for chunk in chunks {
        file.write_all(chunk).await?;
    }
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_payload_limit() {
        let data = vec![7u8; MAX_PAYLOAD * 2 + 10];
        let chunks = split_chunks(&data);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), MAX_PAYLOAD);
        assert_eq!(chunks[2].len(), 10);
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(split_chunks(&[]).is_empty());
    }

    #[tokio::test]
    async fn write_then_read_back() {
        let path = std::env::temp_dir().join(format!("drtp-file-{}.bin", std::process::id()));
        let data: Vec<u8> = (0..4000u32).map(|i| (i % 251) as u8).collect();
        write_chunks(&path, &split_chunks(&data)).await.unwrap();
        assert_eq!(read_chunks(&path).await.unwrap().concat(), data);

        // Truncates rather than appends.
        write_chunks(&path, &[b"short".to_vec()]).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"short");
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
