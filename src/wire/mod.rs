//! The binary wire protocol spoken on the service, registration, and
//! storage-command ports.
//!
//! Every message is one frame: a `u32` payload length followed by the
//! payload, whose first `u32` is the message tag. Primitive encodings are
//! defined in [`primitive`]. One protocol serves all three surfaces; each
//! port simply rejects the tags it does not handle.


pub mod primitive;

use std::io::Cursor;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::path::DfsPath;
use crate::storage::{CommandHandle, StorageHandle};

use primitive::{
    put_bool, put_path, put_paths, put_string, put_strings, put_u32, read_bool,
    read_command_handle, read_path, read_paths, read_storage_handle, read_string, read_strings,
    read_u32,
};

/// Longest admissible frame payload.
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// Request tags. The storage-command tags are sent by the naming server
/// and handled by storage nodes.
mod tag {
    pub const LOCK: u32 = 1;
    pub const UNLOCK: u32 = 2;
    pub const IS_DIRECTORY: u32 = 3;
    pub const LIST: u32 = 4;
    pub const CREATE_FILE: u32 = 5;
    pub const CREATE_DIRECTORY: u32 = 6;
    pub const DELETE: u32 = 7;
    pub const GET_STORAGE: u32 = 8;
    pub const REGISTER: u32 = 16;
    pub const STORAGE_CREATE: u32 = 32;
    pub const STORAGE_DELETE: u32 = 33;

    pub const OK_UNIT: u32 = 0;
    pub const OK_BOOL: u32 = 1;
    pub const OK_NAMES: u32 = 2;
    pub const OK_STORAGE: u32 = 3;
    pub const OK_PATHS: u32 = 4;
    pub const ERR: u32 = 255;
}

/// A request on any of the three surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Lock { path: DfsPath, exclusive: bool },
    Unlock { path: DfsPath, exclusive: bool },
    IsDirectory { path: DfsPath },
    List { path: DfsPath },
    CreateFile { path: DfsPath },
    CreateDirectory { path: DfsPath },
    Delete { path: DfsPath },
    GetStorage { path: DfsPath },
    Register { storage: StorageHandle, command: CommandHandle, files: Vec<DfsPath> },
    StorageCreate { path: DfsPath },
    StorageDelete { path: DfsPath },
}

/// A reply to any request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Unit,
    Bool(bool),
    Names(Vec<String>),
    Storage(StorageHandle),
    Paths(Vec<DfsPath>),
    Err(Error),
}

/// Serializes a request payload.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut buf = Vec::new();
    match request {
        Request::Lock { path, exclusive } => {
            put_u32(&mut buf, tag::LOCK);
            put_path(&mut buf, path);
            put_bool(&mut buf, *exclusive);
        }
        Request::Unlock { path, exclusive } => {
            put_u32(&mut buf, tag::UNLOCK);
            put_path(&mut buf, path);
            put_bool(&mut buf, *exclusive);
        }
        Request::IsDirectory { path } => {
            put_u32(&mut buf, tag::IS_DIRECTORY);
            put_path(&mut buf, path);
        }
        Request::List { path } => {
            put_u32(&mut buf, tag::LIST);
            put_path(&mut buf, path);
        }
        Request::CreateFile { path } => {
            put_u32(&mut buf, tag::CREATE_FILE);
            put_path(&mut buf, path);
        }
        Request::CreateDirectory { path } => {
            put_u32(&mut buf, tag::CREATE_DIRECTORY);
            put_path(&mut buf, path);
        }
        Request::Delete { path } => {
            put_u32(&mut buf, tag::DELETE);
            put_path(&mut buf, path);
        }
        Request::GetStorage { path } => {
            put_u32(&mut buf, tag::GET_STORAGE);
            put_path(&mut buf, path);
        }
        Request::Register { storage, command, files } => {
            put_u32(&mut buf, tag::REGISTER);
            put_string(&mut buf, &storage.to_string());
            put_string(&mut buf, &command.to_string());
            put_paths(&mut buf, files);
        }
        Request::StorageCreate { path } => {
            put_u32(&mut buf, tag::STORAGE_CREATE);
            put_path(&mut buf, path);
        }
        Request::StorageDelete { path } => {
            put_u32(&mut buf, tag::STORAGE_DELETE);
            put_path(&mut buf, path);
        }
    }
    buf
}

/// Parses a request payload.
pub fn decode_request(payload: &[u8]) -> Result<Request> {
    let mut src = Cursor::new(payload);
    let tag = read_u32(&mut src)?;
    let request = match tag {
        tag::LOCK => {
            Request::Lock { path: read_path(&mut src)?, exclusive: read_bool(&mut src)? }
        }
        tag::UNLOCK => {
            Request::Unlock { path: read_path(&mut src)?, exclusive: read_bool(&mut src)? }
        }
        tag::IS_DIRECTORY => Request::IsDirectory { path: read_path(&mut src)? },
        tag::LIST => Request::List { path: read_path(&mut src)? },
        tag::CREATE_FILE => Request::CreateFile { path: read_path(&mut src)? },
        tag::CREATE_DIRECTORY => Request::CreateDirectory { path: read_path(&mut src)? },
        tag::DELETE => Request::Delete { path: read_path(&mut src)? },
        tag::GET_STORAGE => Request::GetStorage { path: read_path(&mut src)? },
        tag::REGISTER => Request::Register {
            storage: read_storage_handle(&mut src)?,
            command: read_command_handle(&mut src)?,
            files: read_paths(&mut src)?,
        },
        tag::STORAGE_CREATE => Request::StorageCreate { path: read_path(&mut src)? },
        tag::STORAGE_DELETE => Request::StorageDelete { path: read_path(&mut src)? },
        other => {
            return Err(Error::InvalidArgument(format!("unknown request tag {other}")));
        }
    };
    ensure_consumed(&src, payload.len())?;
    Ok(request)
}

/// Serializes a reply payload.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let mut buf = Vec::new();
    match reply {
        Reply::Unit => put_u32(&mut buf, tag::OK_UNIT),
        Reply::Bool(value) => {
            put_u32(&mut buf, tag::OK_BOOL);
            put_bool(&mut buf, *value);
        }
        Reply::Names(names) => {
            put_u32(&mut buf, tag::OK_NAMES);
            put_strings(&mut buf, names);
        }
        Reply::Storage(handle) => {
            put_u32(&mut buf, tag::OK_STORAGE);
            put_string(&mut buf, &handle.to_string());
        }
        Reply::Paths(paths) => {
            put_u32(&mut buf, tag::OK_PATHS);
            put_paths(&mut buf, paths);
        }
        Reply::Err(err) => {
            put_u32(&mut buf, tag::ERR);
            put_u32(&mut buf, err.code());
            put_string(&mut buf, err.message());
        }
    }
    buf
}

/// Parses a reply payload.
pub fn decode_reply(payload: &[u8]) -> Result<Reply> {
    let mut src = Cursor::new(payload);
    let reply = match read_u32(&mut src)? {
        tag::OK_UNIT => Reply::Unit,
        tag::OK_BOOL => Reply::Bool(read_bool(&mut src)?),
        tag::OK_NAMES => Reply::Names(read_strings(&mut src)?),
        tag::OK_STORAGE => Reply::Storage(read_storage_handle(&mut src)?),
        tag::OK_PATHS => Reply::Paths(read_paths(&mut src)?),
        tag::ERR => {
            let code = read_u32(&mut src)?;
            let message = read_string(&mut src)?;
            Reply::Err(Error::from_code(code, message))
        }
        other => {
            return Err(Error::InvalidArgument(format!("unknown reply tag {other}")));
        }
    };
    ensure_consumed(&src, payload.len())?;
    Ok(reply)
}

/// Reads one frame. `Ok(None)` signals a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }
    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(Error::InvalidArgument(format!("frame of {len} bytes exceeds the limit")));
    }
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await.map_err(Error::from)?;
    Ok(Some(payload))
}

/// Writes one frame.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&(payload.len() as u32).to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Sends one request over `stream` and awaits its reply.
pub async fn call<S>(mut stream: S, request: &Request) -> Result<Reply>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_frame(&mut stream, &encode_request(request)).await?;
    match read_frame(&mut stream).await? {
        Some(payload) => decode_reply(&payload),
        None => Err(Error::Transport("connection closed before the reply".to_owned())),
    }
}

fn ensure_consumed(src: &Cursor<&[u8]>, len: usize) -> Result<()> {
    if src.position() as usize != len {
        return Err(Error::InvalidArgument("trailing bytes after the message".to_owned()));
    }
    Ok(())
}
