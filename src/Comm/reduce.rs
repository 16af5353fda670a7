// Reduce and all-gather over a shared contribution table

use super::communicator::Communicator;
use super::pack::byte_len;
use crate::error::{Error, Result};

/// Element type tag for typed collectives and pack/unpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    Byte,
    Packed,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    ShortInt,
    Int,
    Unsigned,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    LongInt,
    DoubleInt,
}

impl Datatype {
    /// Size of one element in bytes (LP64 C sizes).
    pub fn size(self) -> usize {
        match self {
            Datatype::Byte | Datatype::Packed | Datatype::Char => 1,
            Datatype::SignedChar | Datatype::UnsignedChar => 1,
            Datatype::Short | Datatype::UnsignedShort | Datatype::ShortInt => 2,
            Datatype::Int | Datatype::Unsigned | Datatype::Float => 4,
            Datatype::Long | Datatype::UnsignedLong => 8,
            Datatype::LongLong | Datatype::UnsignedLongLong | Datatype::Double => 8,
            Datatype::LongDouble | Datatype::LongInt | Datatype::DoubleInt => 16,
        }
    }

    /// Whether [`Communicator::reduce`] can fold elements of this type.
    pub fn is_reducible(self) -> bool {
        !matches!(
            self,
            Datatype::Byte
                | Datatype::Packed
                | Datatype::LongDouble
                | Datatype::LongInt
                | Datatype::DoubleInt
        )
    }
}

/// Reduction operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Max,
    Min,
    Sum,
}

macro_rules! fold_as {
    ($ty:ty, $bytes:expr, $op:expr, $add:expr) => {{
        const WIDTH: usize = std::mem::size_of::<$ty>();
        let mut values = $bytes.chunks_exact(WIDTH).map(|chunk| {
            let mut raw = [0u8; WIDTH];
            raw.copy_from_slice(chunk);
            <$ty>::from_ne_bytes(raw)
        });
        let first = values.next();
        let folded = first.map(|first| {
            values.fold(first, |acc, v| match $op {
                Op::Max => if v > acc { v } else { acc },
                Op::Min => if v < acc { v } else { acc },
                Op::Sum => $add(acc, v),
            })
        });
        folded.map(|v| v.to_ne_bytes().to_vec())
    }};
}

/// Fold a packed array of `datatype` elements into one element.
///
/// Integer sums wrap. Returns `None` for an empty input.
pub fn fold_elements(bytes: &[u8], datatype: Datatype, op: Op) -> Result<Option<Vec<u8>>> {
    let folded = match datatype {
        Datatype::Char | Datatype::SignedChar => fold_as!(i8, bytes, op, i8::wrapping_add),
        Datatype::UnsignedChar => fold_as!(u8, bytes, op, u8::wrapping_add),
        Datatype::Short | Datatype::ShortInt => fold_as!(i16, bytes, op, i16::wrapping_add),
        Datatype::UnsignedShort => fold_as!(u16, bytes, op, u16::wrapping_add),
        Datatype::Int => fold_as!(i32, bytes, op, i32::wrapping_add),
        Datatype::Unsigned => fold_as!(u32, bytes, op, u32::wrapping_add),
        Datatype::Long | Datatype::LongLong => fold_as!(i64, bytes, op, i64::wrapping_add),
        Datatype::UnsignedLong | Datatype::UnsignedLongLong => {
            fold_as!(u64, bytes, op, u64::wrapping_add)
        }
        Datatype::Float => fold_as!(f32, bytes, op, |a: f32, b: f32| a + b),
        Datatype::Double => fold_as!(f64, bytes, op, |a: f64, b: f64| a + b),
        other => return Err(Error::UnsupportedType(other)),
    };
    Ok(folded)
}

impl Communicator {
    /// Fold every rank's `count` elements into a single value of `datatype`.
    ///
    /// Collective. All N×count elements are combined with `op` and the result
    /// (one element, as bytes) is returned on every rank.
    pub fn reduce(&self, send: &[u8], count: usize, datatype: Datatype, op: Op, root: usize) -> Result<Vec<u8>> {
        self.check_active()?;
        self.check_rank(root)?;
        if !datatype.is_reducible() {
            return Err(Error::UnsupportedType(datatype));
        }
        if count == 0 {
            return Err(Error::InvalidArgument("reduce needs at least one element".into()));
        }
        let bytes = byte_len(count, datatype)?;
        if send.len() < bytes {
            return Err(Error::InvalidArgument(format!(
                "send buffer holds {} bytes, {} elements of {:?} need {}",
                send.len(),
                count,
                datatype,
                bytes
            )));
        }

        let contributions = self.exchange(send[..bytes].to_vec())?;
        let all: Vec<u8> = contributions.concat();
        match fold_elements(&all, datatype, op)? {
            Some(value) => Ok(value),
            None => Err(Error::InvalidArgument("reduce received no elements".into())),
        }
    }

    /// Gather `recv_count` elements from every rank into `recv`, in rank order.
    ///
    /// Collective. Send and receive types must agree and `recv_count` may not
    /// exceed `send_count`.
    pub fn allgather(
        &self,
        send: &[u8],
        send_count: usize,
        send_type: Datatype,
        recv: &mut [u8],
        recv_count: usize,
        recv_type: Datatype,
    ) -> Result<()> {
        self.check_active()?;
        if send_type != recv_type {
            return Err(Error::TypeMismatch {
                send: send_type,
                recv: recv_type,
            });
        }
        if recv_count > send_count {
            return Err(Error::InvalidArgument(format!(
                "receive count {} exceeds send count {}",
                recv_count, send_count
            )));
        }
        let send_bytes = byte_len(send_count, send_type)?;
        if send.len() < send_bytes {
            return Err(Error::InvalidArgument(format!(
                "send buffer holds {} bytes, {} needed",
                send.len(),
                send_bytes
            )));
        }
        let block = byte_len(recv_count, recv_type)?;
        let needed = block.checked_mul(self.size()).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "{} ranks of {} byte blocks overflow the address space",
                self.size(),
                block
            ))
        })?;
        if recv.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                available: recv.len(),
            });
        }

        let contributions = self.exchange(send[..send_bytes].to_vec())?;
        for (rank, contribution) in contributions.iter().enumerate() {
            let take = block.min(contribution.len());
            recv[rank * block..rank * block + take].copy_from_slice(&contribution[..take]);
        }
        Ok(())
    }

    /// Deposit `contribution` and collect everybody's, in rank order.
    fn exchange(&self, contribution: Vec<u8>) -> Result<Vec<Vec<u8>>> {
        let world = self.world();
        let timeout = world.config().timeout;
        let table = &world.shared.exchange;

        table.lock()[self.rank()] = Some(contribution);
        world.barrier_wait("exchange", timeout)?;

        let gathered = table
            .lock()
            .iter()
            .map(|c| c.clone().unwrap_or_default())
            .collect::<Vec<_>>();

        // Nobody may overwrite an entry before every rank has read it
        world.barrier_wait("exchange", timeout)?;
        table.lock()[self.rank()] = None;
        Ok(gathered)
    }
}
