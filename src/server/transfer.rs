//! The data-channel transfer loop shared by `RETR`/`STOR`/`APPE`/`STOU` and
//! the listing commands (`LIST`/`NLST`/`MLSD`).

use crate::error::{EngineError, Result};
use crate::fs::{AsciiFile, FileOperation, MappedFile};
use crate::server::ftp_state::{DataChanInitiation, DataChanProtection, TransferType};
use crate::server::socket::Socket;
use crate::server::tls::FtpsConfig;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const BUFFER_SIZE: usize = 64 * 1024;
const TOUCH_INTERVAL: Duration = Duration::from_secs(5);

/// Either transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Server reads the file and writes the socket (`RETR`, listings).
    Send,
    /// Server reads the socket and writes the file (`STOR`, `APPE`).
    Receive,
}

/// File access wrapped for a single transfer, translating CRLF when the
/// session's `TYPE` is ASCII.
enum TransferFile {
    Binary(MappedFile),
    Ascii(AsciiFile),
}

impl TransferFile {
    fn open(path: &Path, op: FileOperation, transfer_type: TransferType) -> std::io::Result<Self> {
        let mapped = MappedFile::open(path, op)?;
        Ok(match transfer_type {
            TransferType::Binary => TransferFile::Binary(mapped),
            TransferType::Ascii => TransferFile::Ascii(AsciiFile::new(mapped)),
        })
    }

    fn read(&mut self, bytes: usize) -> std::io::Result<&[u8]> {
        match self {
            TransferFile::Binary(f) => f.read(bytes),
            TransferFile::Ascii(f) => f.read(bytes),
        }
    }

    fn write(&mut self, bytes: usize) -> std::io::Result<&mut [u8]> {
        match self {
            TransferFile::Binary(f) => f.write(bytes),
            TransferFile::Ascii(f) => f.write(bytes),
        }
    }

    fn set_bytes_written(&mut self, n: usize) -> std::io::Result<()> {
        match self {
            TransferFile::Binary(f) => {
                f.set_bytes_written(n);
                Ok(())
            }
            TransferFile::Ascii(f) => f.set_bytes_written(n),
        }
    }

    fn close(&mut self) -> std::io::Result<()> {
        match self {
            TransferFile::Binary(f) => f.close(),
            TransferFile::Ascii(f) => f.close(),
        }
    }
}

/// Establishes the data connection per the session's `PORT`/`PASV` state,
/// then upgrades it to TLS if `PROT P` is in effect.
pub async fn establish_data_connection(data_chan: &DataChanInitiation, protection: DataChanProtection, ftps: &FtpsConfig) -> Result<Socket> {
    let plain = match data_chan {
        DataChanInitiation::None => return Err(EngineError::BadSequence),
        DataChanInitiation::Port(addr) => TcpStream::connect(addr).await.map_err(EngineError::Io)?,
        DataChanInitiation::Pasv(listener) => {
            let (stream, _peer) = listener.accept().await.map_err(EngineError::Io)?;
            stream
        }
    };

    if protection == DataChanProtection::Private {
        let acceptor = ftps.acceptor().ok_or_else(|| EngineError::Internal("PROT P requires TLS configuration".to_string()))?;
        let tls = crate::server::tls::upgrade(&acceptor, plain).await?;
        Ok(Socket::tls(tls))
    } else {
        Ok(Socket::plain(plain))
    }
}

/// The outcome of a completed (or cut-short) transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Bytes actually moved before the loop stopped.
    pub bytes: u64,
    /// Whether `abort` was observed set before the stream was exhausted.
    pub aborted: bool,
}

/// Runs a full file transfer over an already-established data `socket`,
/// in `direction`, starting at `restart_offset`. Calls `touch` at least
/// every [`TOUCH_INTERVAL`] of wall time so the session's idle clock stays
/// accurate across a long transfer, and checks `abort` every buffer-sized
/// chunk so an `ABOR` observed concurrently by the caller unwinds the loop
/// promptly rather than running the transfer to completion.
///
/// Any I/O error is reported as `426`-worthy by the caller.
pub async fn run(
    socket: &mut Socket,
    path: &Path,
    op: FileOperation,
    transfer_type: TransferType,
    direction: Direction,
    restart_offset: Option<u64>,
    abort: &AtomicBool,
    mut touch: impl FnMut(),
) -> Result<TransferOutcome> {
    let mut file = TransferFile::open(path, op, transfer_type).map_err(EngineError::Io)?;
    if let Some(offset) = restart_offset {
        if let TransferFile::Binary(f) = &mut file {
            f.seek(offset).map_err(EngineError::Io)?;
        }
    }

    let result = match direction {
        Direction::Send => send_loop(socket, &mut file, abort, &mut touch).await,
        Direction::Receive => receive_loop(socket, &mut file, abort, &mut touch).await,
    };

    file.close().map_err(EngineError::Io)?;
    result
}

async fn send_loop(socket: &mut Socket, file: &mut TransferFile, abort: &AtomicBool, touch: &mut impl FnMut()) -> Result<TransferOutcome> {
    let mut total = 0u64;
    let mut last_touch = Instant::now();
    loop {
        if abort.load(Ordering::Relaxed) {
            socket.flush().await.map_err(EngineError::Io)?;
            return Ok(TransferOutcome { bytes: total, aborted: true });
        }
        let chunk = file.read(BUFFER_SIZE).map_err(EngineError::Io)?;
        if chunk.is_empty() {
            break;
        }
        socket.write_all(chunk).await.map_err(EngineError::Io)?;
        total += chunk.len() as u64;
        if last_touch.elapsed() >= TOUCH_INTERVAL {
            touch();
            last_touch = Instant::now();
        }
    }
    socket.flush().await.map_err(EngineError::Io)?;
    Ok(TransferOutcome { bytes: total, aborted: false })
}

async fn receive_loop(socket: &mut Socket, file: &mut TransferFile, abort: &AtomicBool, touch: &mut impl FnMut()) -> Result<TransferOutcome> {
    let mut total = 0u64;
    let mut last_touch = Instant::now();
    loop {
        if abort.load(Ordering::Relaxed) {
            return Ok(TransferOutcome { bytes: total, aborted: true });
        }
        let buf = file.write(BUFFER_SIZE).map_err(EngineError::Io)?;
        let n = socket.read(buf).await.map_err(EngineError::Io)?;
        if n == 0 {
            file.set_bytes_written(0).map_err(EngineError::Io)?;
            break;
        }
        file.set_bytes_written(n).map_err(EngineError::Io)?;
        total += n as u64;
        if last_touch.elapsed() >= TOUCH_INTERVAL {
            touch();
            last_touch = Instant::now();
        }
    }
    Ok(TransferOutcome { bytes: total, aborted: false })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};

    async fn loopback_pair() -> (Socket, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (Socket::plain(server), client)
    }

    #[tokio::test]
    async fn send_loop_streams_whole_file() {
        let path = std::env::temp_dir().join(format!("vftpd-transfer-send-{}", std::process::id()));
        std::fs::write(&path, b"hello world").unwrap();

        let (mut server_socket, mut client) = loopback_pair().await;
        let path_clone = path.clone();
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            client.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let outcome = run(&mut server_socket, &path_clone, FileOperation::Read, TransferType::Binary, Direction::Send, None, &AtomicBool::new(false), || {})
            .await
            .unwrap();
        drop(server_socket);

        let received = reader.await.unwrap();
        assert_eq!(outcome.bytes, 11);
        assert!(!outcome.aborted);
        assert_eq!(&received, b"hello world");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn receive_loop_writes_whole_stream() {
        let path = std::env::temp_dir().join(format!("vftpd-transfer-recv-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let (mut server_socket, mut client) = loopback_pair().await;
        let writer = tokio::spawn(async move {
            client.write_all(b"uploaded data").await.unwrap();
            client.shutdown().await.unwrap();
        });

        let path_clone = path.clone();
        let outcome = run(
            &mut server_socket,
            &path_clone,
            FileOperation::WriteNew,
            TransferType::Binary,
            Direction::Receive,
            None,
            &AtomicBool::new(false),
            || {},
        )
        .await
        .unwrap();
        writer.await.unwrap();

        assert_eq!(outcome.bytes, 13);
        assert!(!outcome.aborted);
        assert_eq!(std::fs::read(&path).unwrap(), b"uploaded data");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn send_loop_stops_early_when_aborted() {
        let path = std::env::temp_dir().join(format!("vftpd-transfer-abort-{}", std::process::id()));
        std::fs::write(&path, vec![0u8; BUFFER_SIZE * 4]).unwrap();

        let (mut server_socket, mut client) = loopback_pair().await;
        let abort = AtomicBool::new(true);
        let reader = tokio::spawn(async move {
            let mut buf = Vec::new();
            let _ = client.read_to_end(&mut buf).await;
            buf
        });

        let path_clone = path.clone();
        let outcome = run(&mut server_socket, &path_clone, FileOperation::Read, TransferType::Binary, Direction::Send, None, &abort, || {})
            .await
            .unwrap();
        drop(server_socket);
        reader.await.unwrap();

        assert!(outcome.aborted);
        assert_eq!(outcome.bytes, 0);

        std::fs::remove_file(&path).ok();
    }
}
