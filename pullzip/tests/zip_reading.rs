//! End-to-end archive reading over synthesized ZIP files.

use pullzip::crypto::ZipCrypto;
use pullzip::{MemorySource, StreamSource, ZipArchive, ZipError};
use pullzip_core::Crc32;
use std::io::Cursor;

const DOS_DATE_1980: u16 = 0x0021;

struct MemberRecord {
    name: String,
    method: u16,
    flags: u16,
    crc: u32,
    compressed_len: u32,
    uncompressed_len: u32,
    offset: u32,
}

/// Writes local headers as members are added, then the central
/// directory and end record on `finish`.
struct ArchiveBuilder {
    data: Vec<u8>,
    members: Vec<MemberRecord>,
}

impl ArchiveBuilder {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            members: Vec::new(),
        }
    }

    fn add_member(
        &mut self,
        name: &str,
        method: u16,
        flags: u16,
        crc: u32,
        compressed: &[u8],
        uncompressed_len: u32,
    ) {
        let offset = self.data.len() as u32;
        self.data.extend_from_slice(&0x04034B50u32.to_le_bytes());
        self.data.extend_from_slice(&20u16.to_le_bytes()); // version needed
        self.data.extend_from_slice(&flags.to_le_bytes());
        self.data.extend_from_slice(&method.to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // time
        self.data.extend_from_slice(&DOS_DATE_1980.to_le_bytes());
        self.data.extend_from_slice(&crc.to_le_bytes());
        self.data
            .extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        self.data.extend_from_slice(&uncompressed_len.to_le_bytes());
        self.data
            .extend_from_slice(&(name.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // extra len
        self.data.extend_from_slice(name.as_bytes());
        self.data.extend_from_slice(compressed);

        self.members.push(MemberRecord {
            name: name.to_string(),
            method,
            flags,
            crc,
            compressed_len: compressed.len() as u32,
            uncompressed_len,
            offset,
        });
    }

    fn finish_with_comment(mut self, comment: &[u8]) -> Vec<u8> {
        let cd_offset = self.data.len() as u32;
        for member in &self.members {
            self.data.extend_from_slice(&0x02014B50u32.to_le_bytes());
            self.data.extend_from_slice(&20u16.to_le_bytes()); // made by
            self.data.extend_from_slice(&20u16.to_le_bytes()); // needed
            self.data.extend_from_slice(&member.flags.to_le_bytes());
            self.data.extend_from_slice(&member.method.to_le_bytes());
            self.data.extend_from_slice(&0u16.to_le_bytes()); // time
            self.data.extend_from_slice(&DOS_DATE_1980.to_le_bytes());
            self.data.extend_from_slice(&member.crc.to_le_bytes());
            self.data
                .extend_from_slice(&member.compressed_len.to_le_bytes());
            self.data
                .extend_from_slice(&member.uncompressed_len.to_le_bytes());
            self.data
                .extend_from_slice(&(member.name.len() as u16).to_le_bytes());
            self.data.extend_from_slice(&0u16.to_le_bytes()); // extra len
            self.data.extend_from_slice(&0u16.to_le_bytes()); // comment len
            self.data.extend_from_slice(&0u16.to_le_bytes()); // disk start
            self.data.extend_from_slice(&0u16.to_le_bytes()); // internal
            self.data.extend_from_slice(&0u32.to_le_bytes()); // external
            self.data.extend_from_slice(&member.offset.to_le_bytes());
            self.data.extend_from_slice(member.name.as_bytes());
        }
        let cd_size = self.data.len() as u32 - cd_offset;

        self.data.extend_from_slice(&0x06054B50u32.to_le_bytes());
        self.data.extend_from_slice(&0u16.to_le_bytes()); // this disk
        self.data.extend_from_slice(&0u16.to_le_bytes()); // cd start disk
        self.data
            .extend_from_slice(&(self.members.len() as u16).to_le_bytes());
        self.data
            .extend_from_slice(&(self.members.len() as u16).to_le_bytes());
        self.data.extend_from_slice(&cd_size.to_le_bytes());
        self.data.extend_from_slice(&cd_offset.to_le_bytes());
        self.data
            .extend_from_slice(&(comment.len() as u16).to_le_bytes());
        self.data.extend_from_slice(comment);
        self.data
    }

    fn finish(self) -> Vec<u8> {
        self.finish_with_comment(b"")
    }
}

/// Encode a stored member with ZipCrypto applied.
fn encrypt_stored(payload: &[u8], password: &[u8], crc: u32) -> Vec<u8> {
    let mut cipher = ZipCrypto::new(password);
    let mut out = Vec::with_capacity(12 + payload.len());
    // 11 arbitrary bytes, then the CRC high byte as the check byte
    for i in 0..11u8 {
        out.push(cipher.encrypt_byte(0x40 + i));
    }
    out.push(cipher.encrypt_byte((crc >> 24) as u8));
    for &b in payload {
        out.push(cipher.encrypt_byte(b));
    }
    out
}

mod deflate_streams {
    //! Minimal DEFLATE encoders for test payloads.

    pub struct BitSink {
        pub out: Vec<u8>,
        nbits: usize,
    }

    impl BitSink {
        pub fn new() -> Self {
            Self {
                out: Vec::new(),
                nbits: 0,
            }
        }

        fn bit(&mut self, bit: u32) {
            if self.nbits % 8 == 0 {
                self.out.push(0);
            }
            if bit != 0 {
                *self.out.last_mut().unwrap() |= 1 << (self.nbits % 8);
            }
            self.nbits += 1;
        }

        pub fn bits_lsb(&mut self, value: u32, count: u32) {
            for i in 0..count {
                self.bit((value >> i) & 1);
            }
        }

        pub fn code_msb(&mut self, code: u32, count: u32) {
            for i in (0..count).rev() {
                self.bit((code >> i) & 1);
            }
        }
    }

    /// One fixed-Huffman block of literals.
    pub fn fixed_literal_block(data: &[u8]) -> Vec<u8> {
        let mut sink = BitSink::new();
        sink.bits_lsb(1, 1);
        sink.bits_lsb(0b01, 2);
        for &byte in data {
            if byte < 144 {
                sink.code_msb(0x30 + byte as u32, 8);
            } else {
                sink.code_msb(0x190 + (byte as u32 - 144), 9);
            }
        }
        sink.code_msb(0, 7);
        sink.out
    }

    /// `count` zero bytes as a single dynamic-Huffman block.
    pub fn dynamic_zero_block(count: usize) -> Vec<u8> {
        const ORDER: [usize; 19] = [
            16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
        ];

        let mut sink = BitSink::new();
        sink.bits_lsb(1, 1);
        sink.bits_lsb(0b10, 2);
        sink.bits_lsb(0, 5); // HLIT = 257
        sink.bits_lsb(0, 5); // HDIST = 1
        sink.bits_lsb(14, 4); // HCLEN = 18
        for &symbol in ORDER.iter().take(18) {
            let len = if symbol == 1 || symbol == 18 { 1 } else { 0 };
            sink.bits_lsb(len, 3);
        }
        sink.code_msb(0, 1); // literal 0 gets length 1
        sink.code_msb(1, 1);
        sink.bits_lsb(138 - 11, 7);
        sink.code_msb(1, 1);
        sink.bits_lsb(117 - 11, 7);
        sink.code_msb(0, 1); // symbol 256 gets length 1
        sink.code_msb(0, 1); // the lone distance symbol

        for _ in 0..count {
            sink.code_msb(0, 1);
        }
        sink.code_msb(1, 1);
        sink.out
    }
}

#[test]
fn stored_member_roundtrip() {
    // One stored member "hello.txt" = "Hello!"
    let mut builder = ArchiveBuilder::new();
    assert_eq!(Crc32::compute(b"Hello!"), 0x9D2ACC56);
    builder.add_member("hello.txt", 0, 0, 0x9D2ACC56, b"Hello!", 6);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    assert_eq!(archive.len(), 1);
    let header = &archive.files()[0];
    assert_eq!(header.path, "hello.txt");
    assert_eq!(header.uncompressed_size, 6);

    let mut file = archive.open_file("hello.txt", None).unwrap();
    assert_eq!(file.read_to_end().unwrap(), b"Hello!");
}

#[test]
fn deflated_member_roundtrip() {
    // "a.txt" = ten 'a' bytes, deflated
    let stream = deflate_streams::fixed_literal_block(b"aaaaaaaaaa");
    let mut builder = ArchiveBuilder::new();
    builder.add_member("a.txt", 8, 0, 0x4C11CDF0, &stream, 10);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    let mut file = archive.open_file("a.txt", None).unwrap();
    assert_eq!(file.read_to_end().unwrap(), vec![0x61u8; 10]);
}

#[test]
fn dynamic_block_member_of_zeros() {
    // 10 000 zero bytes in one dynamic Huffman block
    let payload = vec![0u8; 10000];
    let crc = Crc32::compute(&payload);
    let stream = deflate_streams::dynamic_zero_block(10000);

    let mut builder = ArchiveBuilder::new();
    builder.add_member("zeros.bin", 8, 0, crc, &stream, 10000);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    let mut file = archive.open_file("zeros.bin", None).unwrap();
    assert_eq!(file.read_to_end().unwrap(), payload);
}

#[test]
fn encrypted_member_with_password() {
    // ZipCrypto stored member, 16 bytes 0x00..0x0F, password "pw"
    let payload: Vec<u8> = (0..16).collect();
    let crc = Crc32::compute(&payload);
    let encrypted = encrypt_stored(&payload, b"pw", crc);

    let mut builder = ArchiveBuilder::new();
    builder.add_member("s.bin", 0, 1, crc, &encrypted, payload.len() as u32);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    assert!(archive.files()[0].is_encrypted());
    let mut file = archive.open_file("s.bin", Some(b"pw")).unwrap();
    assert_eq!(file.read_to_end().unwrap(), payload);

    // Wrong password fails at the header check or, with 1/256
    // probability of a colliding check byte, at CRC validation.
    let result = archive
        .open_file("s.bin", Some(b"bad"))
        .and_then(|mut f| f.read_to_end());
    assert!(matches!(
        result,
        Err(ZipError::BadPassword) | Err(ZipError::CrcMismatch { .. })
    ));

    // Missing password behaves like a wrong one
    let result = archive
        .open_file("s.bin", None)
        .and_then(|mut f| f.read_to_end());
    assert!(result.is_err());
}

#[test]
fn encrypted_deflated_member() {
    let payload = b"encrypted and deflated content";
    let crc = Crc32::compute(payload);
    let stream = deflate_streams::fixed_literal_block(payload);
    let encrypted = encrypt_stored(&stream, b"sesame", crc);

    let mut builder = ArchiveBuilder::new();
    builder.add_member("d.txt", 8, 1, crc, &encrypted, payload.len() as u32);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    let mut file = archive.open_file("d.txt", Some(b"sesame")).unwrap();
    assert_eq!(file.read_to_end().unwrap(), payload);
}

#[test]
fn empty_stored_member() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("empty", 0, 0, 0, b"", 0);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    let mut file = archive.open_file("empty", None).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(file.read(&mut buf).unwrap(), 0);
    assert_eq!(file.read_to_end().unwrap(), b"");
}

#[test]
fn comment_lengths_across_search_windows() {
    for comment_len in [0usize, 200, 2000] {
        let mut builder = ArchiveBuilder::new();
        builder.add_member("f", 0, 0, Crc32::compute(b"data"), b"data", 4);
        let bytes = builder.finish_with_comment(&vec![b'c'; comment_len]);

        let archive = ZipArchive::open(MemorySource::new(bytes)).unwrap();
        assert_eq!(archive.len(), 1, "comment length {}", comment_len);
        let mut file = archive.open_file("f", None).unwrap();
        assert_eq!(file.read_to_end().unwrap(), b"data");
    }
}

#[test]
fn spurious_signature_in_comment() {
    // 1024 filler bytes then a planted end-record signature
    let mut comment = vec![b'X'; 1024];
    comment.extend_from_slice(&0x06054B50u32.to_le_bytes());

    let mut builder = ArchiveBuilder::new();
    builder.add_member("real.txt", 0, 0, Crc32::compute(b"real"), b"real", 4);
    let bytes = builder.finish_with_comment(&comment);

    let archive = ZipArchive::open(MemorySource::new(bytes)).unwrap();
    assert_eq!(archive.len(), 1);
    assert_eq!(archive.files()[0].path, "real.txt");
    let mut file = archive.open_file("real.txt", None).unwrap();
    assert_eq!(file.read_to_end().unwrap(), b"real");
}

#[test]
fn directory_parsing_is_idempotent() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("one", 0, 0, Crc32::compute(b"1"), b"1", 1);
    builder.add_member("two", 0, 0, Crc32::compute(b"22"), b"22", 2);
    let bytes = builder.finish();

    let first = ZipArchive::open(MemorySource::new(bytes.clone())).unwrap();
    let second = ZipArchive::open(MemorySource::new(bytes)).unwrap();
    assert_eq!(first.files(), second.files());
}

#[test]
fn member_lookup_failures() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("present", 0, 0, Crc32::compute(b"x"), b"x", 1);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    assert!(matches!(
        archive.open_file("absent", None),
        Err(ZipError::NoSuchMember { .. })
    ));
    assert!(matches!(
        archive.open_file_by_index(1, None),
        Err(ZipError::NoSuchMember { .. })
    ));
    assert!(archive.open_file_by_index(0, None).is_ok());
}

#[test]
fn unsupported_compression_method() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("odd", 97, 0, 0, b"????", 4);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    assert!(matches!(
        archive.open_file("odd", None),
        Err(ZipError::UnsupportedCompression { method: 97 })
    ));
}

#[cfg(feature = "bzip2")]
#[test]
fn bzip2_member_roundtrip() {
    use bzip2::read::BzEncoder;
    use std::io::Read;

    let payload: Vec<u8> = b"bzip2-compressed member payload ".repeat(200);
    let mut compressed = Vec::new();
    BzEncoder::new(&payload[..], bzip2::Compression::best())
        .read_to_end(&mut compressed)
        .unwrap();

    let mut builder = ArchiveBuilder::new();
    builder.add_member(
        "b.txt",
        12,
        0,
        Crc32::compute(&payload),
        &compressed,
        payload.len() as u32,
    );
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();
    let mut file = archive.open_file("b.txt", None).unwrap();
    assert_eq!(file.read_to_end().unwrap(), payload);
}

#[cfg(not(feature = "bzip2"))]
#[test]
fn bzip2_member_without_backend() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("b", 12, 0, 0, b"BZh9", 4);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();
    assert!(matches!(
        archive.open_file("b", None),
        Err(ZipError::UnsupportedCompression { method: 12 })
    ));
}

#[test]
fn corrupt_local_header_is_detected() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("f", 0, 0, Crc32::compute(b"data"), b"data", 4);
    let mut bytes = builder.finish();
    bytes[0] ^= 0xFF; // break the local header signature

    let archive = ZipArchive::open(MemorySource::new(bytes)).unwrap();
    assert!(matches!(
        archive.open_file("f", None),
        Err(ZipError::LocalHeaderMismatch { offset: 0 })
    ));
}

#[test]
fn not_a_zip_archive() {
    let err = ZipArchive::open(MemorySource::new(vec![0u8; 1000])).unwrap_err();
    assert!(matches!(err, ZipError::NotAZipArchive));

    let err = ZipArchive::open(MemorySource::new(b"PK".to_vec())).unwrap_err();
    assert!(matches!(err, ZipError::NotAZipArchive));
}

#[test]
fn oversized_directory_is_rejected() {
    // A bare end record claiming a > 1 GiB directory
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&0x06054B50u32.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&0x8000_0000u32.to_le_bytes()); // cd size: 2 GiB
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());

    assert!(matches!(
        ZipArchive::open(MemorySource::new(bytes)),
        Err(ZipError::DirectoryTooLarge { .. })
    ));
}

#[test]
fn truncated_directory_fails_early() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("f", 0, 0, Crc32::compute(b"d"), b"d", 1);
    let mut bytes = builder.finish();

    // Claim one more entry than the directory holds
    let entries_at = bytes.len() - 14;
    bytes[entries_at] = 2;
    bytes[entries_at + 2] = 2;

    assert!(matches!(
        ZipArchive::open(MemorySource::new(bytes)),
        Err(ZipError::MalformedDirectory { .. })
    ));
}

#[test]
fn sequential_reads_preserve_stream_order() {
    let payload: Vec<u8> = (0..1000u32).map(|i| (i % 256) as u8).collect();
    let mut builder = ArchiveBuilder::new();
    builder.add_member(
        "seq",
        0,
        0,
        Crc32::compute(&payload),
        &payload,
        payload.len() as u32,
    );
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    let mut file = archive.open_file("seq", None).unwrap();
    let mut out = Vec::new();
    let mut buf = [0u8; 37];
    loop {
        let n = file.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out, payload);
}

#[test]
fn independent_members_read_in_parallel() {
    let mut builder = ArchiveBuilder::new();
    let payloads: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 5000]).collect();
    for (i, payload) in payloads.iter().enumerate() {
        builder.add_member(
            &format!("m{}", i),
            0,
            0,
            Crc32::compute(payload),
            payload,
            payload.len() as u32,
        );
    }
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let mut file = archive.open_file_by_index(i, None).unwrap();
            std::thread::spawn(move || file.read_to_end().unwrap())
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), payloads[i]);
    }
}

#[test]
fn archive_over_mutex_stream_source() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("s", 0, 0, Crc32::compute(b"stream"), b"stream", 6);
    let bytes = builder.finish();

    let source = StreamSource::from_stream(Cursor::new(bytes)).unwrap();
    let archive = ZipArchive::open(source).unwrap();
    let mut file = archive.open_file("s", None).unwrap();
    assert_eq!(file.read_to_end().unwrap(), b"stream");
}

#[test]
fn failed_member_does_not_invalidate_archive() {
    let mut builder = ArchiveBuilder::new();
    builder.add_member("bad", 97, 0, 0, b"??", 2);
    builder.add_member("good", 0, 0, Crc32::compute(b"fine"), b"fine", 4);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();

    assert!(archive.open_file("bad", None).is_err());
    let mut file = archive.open_file("good", None).unwrap();
    assert_eq!(file.read_to_end().unwrap(), b"fine");
}

#[test]
fn utf8_flag_decodes_path() {
    let name = "ünïcode.txt";
    let mut builder = ArchiveBuilder::new();
    builder.add_member(name, 0, 1 << 11, Crc32::compute(b"u"), b"u", 1);
    let archive = ZipArchive::open(MemorySource::new(builder.finish())).unwrap();
    assert_eq!(archive.files()[0].path, name);
    assert!(archive.open_file(name, None).is_ok());
}
