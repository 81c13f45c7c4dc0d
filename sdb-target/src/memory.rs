//! ゲストメモリ

use crate::MemoryReader;
use thiserror::Error;

/// ゲストメモリのベースアドレス
pub const MEMORY_BASE: u64 = 0x8000_0000;

/// ゲストメモリのデフォルトサイズ（128 MiB）
pub const DEFAULT_MEMORY_SIZE: usize = 0x800_0000;

/// メモリアクセスのエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("address 0x{address:x} (len {len}) is out of bound of memory [0x{start:x}, 0x{end:x})")]
    OutOfBound {
        address: u64,
        len: usize,
        start: u64,
        end: u64,
    },

    #[error("unsupported access width: {0} bytes")]
    BadWidth(usize),
}

/// メモリから読み取り可能な型
pub trait MemoryReadable: Sized {
    /// リトルエンディアンバイト列から値を構築
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// リトルエンディアンバイト列に変換
    fn to_le_vec(&self) -> Vec<u8>;

    /// 型のサイズ（バイト数）
    fn size() -> usize;
}

macro_rules! impl_memory_readable {
    ($($ty:ty),*) => {
        $(
            impl MemoryReadable for $ty {
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut array = [0u8; std::mem::size_of::<$ty>()];
                    array.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                    <$ty>::from_le_bytes(array)
                }

                fn to_le_vec(&self) -> Vec<u8> {
                    self.to_le_bytes().to_vec()
                }

                fn size() -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )*
    };
}

impl_memory_readable!(u8, u16, u32, u64);

/// フラットなゲスト物理メモリ
///
/// `[base, base + size)` の範囲をリトルエンディアンで保持します。
pub struct Memory {
    base: u64,
    data: Vec<u8>,
}

impl Memory {
    /// `base` から `size` バイトの0初期化されたメモリを作成する
    pub fn new(base: u64, size: usize) -> Self {
        Self {
            base,
            data: vec![0; size],
        }
    }

    /// ベースアドレスを取得する
    pub fn base(&self) -> u64 {
        self.base
    }

    /// サイズ（バイト数）を取得する
    pub fn size(&self) -> usize {
        self.data.len()
    }

    fn offset_of(&self, address: u64, len: usize) -> Result<usize, MemoryError> {
        let end = self.base + self.data.len() as u64;
        let out_of_bound = || MemoryError::OutOfBound {
            address,
            len,
            start: self.base,
            end,
        };

        let offset = address.checked_sub(self.base).ok_or_else(out_of_bound)?;
        let last = offset.checked_add(len as u64).ok_or_else(out_of_bound)?;
        if last > self.data.len() as u64 {
            return Err(out_of_bound());
        }
        Ok(offset as usize)
    }

    /// バイト列をそのまま読み取る
    pub fn read_bytes(&self, address: u64, len: usize) -> Result<&[u8], MemoryError> {
        let offset = self.offset_of(address, len)?;
        Ok(&self.data[offset..offset + len])
    }

    /// 型付き値を読み取る
    pub fn read_typed<T: MemoryReadable>(&self, address: u64) -> Result<T, MemoryError> {
        let bytes = self.read_bytes(address, T::size())?;
        Ok(T::from_le_slice(bytes))
    }

    /// 型付き値を書き込む
    pub fn write_typed<T: MemoryReadable>(&mut self, address: u64, value: T) -> Result<(), MemoryError> {
        let offset = self.offset_of(address, T::size())?;
        self.data[offset..offset + T::size()].copy_from_slice(&value.to_le_vec());
        Ok(())
    }

    /// `len` バイト（1, 2, 4, 8）を読み取り、ゼロ拡張して返す
    pub fn read(&self, address: u64, len: usize) -> Result<u64, MemoryError> {
        match len {
            1 => self.read_typed::<u8>(address).map(u64::from),
            2 => self.read_typed::<u16>(address).map(u64::from),
            4 => self.read_typed::<u32>(address).map(u64::from),
            8 => self.read_typed::<u64>(address),
            _ => Err(MemoryError::BadWidth(len)),
        }
    }

    /// `value` の下位 `len` バイト（1, 2, 4, 8）を書き込む
    pub fn write(&mut self, address: u64, len: usize, value: u64) -> Result<(), MemoryError> {
        match len {
            1 => self.write_typed(address, value as u8),
            2 => self.write_typed(address, value as u16),
            4 => self.write_typed(address, value as u32),
            8 => self.write_typed(address, value),
            _ => Err(MemoryError::BadWidth(len)),
        }
    }

    /// u32値を読み取る（命令フェッチ、`x` コマンド用）
    pub fn read_u32(&self, address: u64) -> Result<u32, MemoryError> {
        self.read_typed(address)
    }

    /// イメージを `address` からコピーする
    pub fn load(&mut self, address: u64, image: &[u8]) -> Result<(), MemoryError> {
        let offset = self.offset_of(address, image.len())?;
        self.data[offset..offset + image.len()].copy_from_slice(image);
        Ok(())
    }
}

impl MemoryReader for Memory {
    fn read_memory(&self, address: u64, len: usize) -> Result<u64, MemoryError> {
        self.read(address, len)
    }
}
