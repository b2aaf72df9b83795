#![no_main]

#[macro_use]
extern crate libfuzzer_sys;

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use vftpd::FtpCodec;

fuzz_target!(|data: &[u8]| {
    let mut buf = BytesMut::from(data);
    let mut codec = FtpCodec::new();
    while let Ok(Some(_)) = codec.decode(&mut buf) {}
});
