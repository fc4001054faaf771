//! Primitive read/write helpers for the wire format.
//!
//! All integers travel big-endian. Strings are a `u32` length followed by
//! UTF-8 bytes; booleans are a single byte; lists are a `u32` count
//! followed by the elements. Reading is bounds-checked against fixed
//! limits so a misbehaving peer cannot make the server allocate
//! arbitrarily.

use std::io::Read;
use std::str::FromStr;

use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};
use crate::path::DfsPath;
use crate::storage::{CommandHandle, StorageHandle};

/// Longest admissible string field.
pub const MAX_STRING_LEN: usize = 4096;

/// Longest admissible list field.
pub const MAX_LIST_LEN: usize = 65_536;

pub fn put_u8(buf: &mut Vec<u8>, value: u8) {
    buf.push(value);
}

pub fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_be_bytes());
}

pub fn put_bool(buf: &mut Vec<u8>, value: bool) {
    put_u8(buf, value as u8);
}

pub fn put_string(buf: &mut Vec<u8>, value: &str) {
    put_u32(buf, value.len() as u32);
    buf.extend_from_slice(value.as_bytes());
}

pub fn put_path(buf: &mut Vec<u8>, path: &DfsPath) {
    put_string(buf, &path.to_string());
}

pub fn put_paths(buf: &mut Vec<u8>, paths: &[DfsPath]) {
    put_u32(buf, paths.len() as u32);
    for path in paths {
        put_path(buf, path);
    }
}

pub fn put_strings(buf: &mut Vec<u8>, values: &[String]) {
    put_u32(buf, values.len() as u32);
    for value in values {
        put_string(buf, value);
    }
}

pub fn read_u8(src: &mut impl Read) -> Result<u8> {
    src.read_u8().map_err(truncated)
}

pub fn read_u32(src: &mut impl Read) -> Result<u32> {
    src.read_u32::<BigEndian>().map_err(truncated)
}

pub fn read_bool(src: &mut impl Read) -> Result<bool> {
    match read_u8(src)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(Error::InvalidArgument(format!("malformed boolean byte {other}"))),
    }
}

pub fn read_string(src: &mut impl Read) -> Result<String> {
    let len = read_u32(src)? as usize;
    if len > MAX_STRING_LEN {
        return Err(Error::InvalidArgument(format!("string of {len} bytes exceeds the limit")));
    }
    let mut bytes = vec![0u8; len];
    src.read_exact(&mut bytes).map_err(truncated)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidArgument("string field is not UTF-8".to_owned()))
}

pub fn read_path(src: &mut impl Read) -> Result<DfsPath> {
    DfsPath::parse(&read_string(src)?)
}

pub fn read_paths(src: &mut impl Read) -> Result<Vec<DfsPath>> {
    let count = read_u32(src)? as usize;
    if count > MAX_LIST_LEN {
        return Err(Error::InvalidArgument(format!("list of {count} entries exceeds the limit")));
    }
    let mut paths = Vec::with_capacity(count);
    for _ in 0..count {
        paths.push(read_path(src)?);
    }
    Ok(paths)
}

pub fn read_strings(src: &mut impl Read) -> Result<Vec<String>> {
    let count = read_u32(src)? as usize;
    if count > MAX_LIST_LEN {
        return Err(Error::InvalidArgument(format!("list of {count} entries exceeds the limit")));
    }
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(read_string(src)?);
    }
    Ok(values)
}

pub fn read_storage_handle(src: &mut impl Read) -> Result<StorageHandle> {
    StorageHandle::from_str(&read_string(src)?)
}

pub fn read_command_handle(src: &mut impl Read) -> Result<CommandHandle> {
    CommandHandle::from_str(&read_string(src)?)
}

fn truncated(_: std::io::Error) -> Error {
    Error::InvalidArgument("truncated message".to_owned())
}
