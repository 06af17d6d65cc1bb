//! The decompression stream handle: a resumable, byte-driven parser.
//!
//! Every field of the compressed stream, from the magic bytes down to the
//! single-bit selector digits, is a checkpoint in an explicit state enum.
//! A bit request that cannot be satisfied from the caller's input window
//! hands control back with `Status::Ok`; because every working variable
//! lives on the handle, the next call re-enters the same state and retries
//! the same request. The output side works the same way in reverse: the
//! inverse-BWT walk and inverse RLE1 emit into the caller's output window
//! and suspend mid-run when it fills.
//!
//! Decoded symbols drive the block reconstruction directly: each literal or
//! zero-run lands in the fast `tt` table (or the `ll16`/`ll4` pair in
//! small mode) as it is decoded, and the inverse transform is set up the
//! moment the end-of-block symbol arrives.

use log::{debug, error, info, warn};

use crate::bitstream::bitreader::BitReader;
use crate::error::{Error, Progress, Result, Status};
use crate::huffman_coding::decode_tables::{create_decode_table, DecodeTable};
use crate::huffman_coding::huffman::GROUP_SIZE;
use crate::tools::crc::{do_stream_crc, BlockCrc};
use crate::tools::rand_table::Randomiser;
use crate::tools::rle2_mtf::{MAX_ALPHA_SIZE, RUNA, RUNB};
use crate::tools::symbol_map::decode_sym_map;

use super::compress::BLOCK_UNIT;

/// Longest code the decoder will chase before calling the stream corrupt.
const MAX_CODE_LEN_DECODE: u32 = 20;
/// Most selectors a stream may usefully carry. Streams that round their
/// count up past this are tolerated; the excess selectors are ignored.
const MAX_SELECTORS: usize = 2 + 900_000 / GROUP_SIZE;
/// Most coding tables a block may carry.
const MAX_TABLES: usize = 6;
/// Cap on the zero-run accumulator; no legitimate run gets near it.
const RUN_CAP: i64 = 0x0020_0000;

/// Every suspension point of the parser. States that read several fields
/// keep their loop counters on the handle, so a unit variant per field is
/// enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Magic1,
    Magic2,
    Magic3,
    MagicLevel,
    BlkByte1,
    BlkMagic2,
    BlkMagic3,
    BlockCrc,
    RandBit,
    OrigPtr,
    MapCoarse,
    MapFine,
    Groups,
    SelCount,
    Selectors,
    Coding1,
    Coding2,
    Coding3,
    MtfVec,
    MtfCheck,
    MtfBit,
    EndMagic2,
    EndMagic3,
    CombinedCrc,
    Output,
    Idle,
}

/// Why the parser handed control back.
enum Parse {
    NeedInput,
    OutputReady,
    StreamEnd,
}

/// Why the output machine handed control back.
enum Emit {
    NeedOutput,
    BlockDone,
}

macro_rules! need {
    ($e:expr) => {
        match $e {
            Some(v) => v,
            None => return Ok(Parse::NeedInput),
        }
    };
}

/// A resumable bzip2 decompressor over caller-supplied byte windows.
pub struct DecompressStream {
    state: State,
    failed: bool,
    small: bool,
    bits: BitReader,

    level: u32,
    block_size: usize,
    block_no: u32,
    combined_crc: u32,

    stored_block_crc: u32,
    block_randomised: bool,
    orig_ptr: usize,

    sym_map_words: Vec<u16>,
    symbol_set: Vec<u8>,
    alpha_size: usize,
    eob: u16,

    n_groups: usize,
    n_selectors: usize,
    selector_mtf: Vec<u8>,
    selectors: Vec<u8>,
    len: [[u8; MAX_ALPHA_SIZE]; MAX_TABLES],
    tables: Vec<DecodeTable>,

    // Loop counters and scratch for the multi-field states.
    i: usize,
    j: usize,
    t: usize,
    curr: i32,

    // Symbol decoding.
    group_no: i32,
    group_pos: i32,
    g_sel: usize,
    zn: u32,
    zvec: i32,
    in_run: bool,
    run_acc: i64,
    run_n: i64,
    mtf: [u8; 256],

    // Block payload and inverse-BWT tables.
    nblock: usize,
    unzftab: [u32; 256],
    cftab: [u32; 257],
    cftab_copy: [u32; 257],
    tt: Vec<u32>,
    ll16: Vec<u16>,
    ll4: Vec<u8>,

    // Output machine.
    t_pos: u32,
    nblock_used: usize,
    k0: u8,
    state_out_ch: u8,
    state_out_len: u32,
    rand: Randomiser,
    block_crc_calc: BlockCrc,

    total_in: u64,
    total_out: u64,
}

impl DecompressStream {
    /// Create a decompressor. `small` trades speed for the compact
    /// `ll16`/`ll4` inverse-BWT representation (roughly 2.5 bytes per block
    /// byte instead of 4).
    pub fn new(small: bool) -> Result<Self> {
        crate::config_check()?;
        Ok(Self {
            state: State::Magic1,
            failed: false,
            small,
            bits: BitReader::new(),
            level: 0,
            block_size: 0,
            block_no: 0,
            combined_crc: 0,
            stored_block_crc: 0,
            block_randomised: false,
            orig_ptr: 0,
            sym_map_words: Vec::new(),
            symbol_set: Vec::new(),
            alpha_size: 0,
            eob: 0,
            n_groups: 0,
            n_selectors: 0,
            selector_mtf: Vec::new(),
            selectors: Vec::new(),
            len: [[0; MAX_ALPHA_SIZE]; MAX_TABLES],
            tables: Vec::new(),
            i: 0,
            j: 0,
            t: 0,
            curr: 0,
            group_no: 0,
            group_pos: 0,
            g_sel: 0,
            zn: 0,
            zvec: 0,
            in_run: false,
            run_acc: 0,
            run_n: 0,
            mtf: [0; 256],
            nblock: 0,
            unzftab: [0; 256],
            cftab: [0; 257],
            cftab_copy: [0; 257],
            tt: Vec::new(),
            ll16: Vec::new(),
            ll4: Vec::new(),
            t_pos: 0,
            nblock_used: 0,
            k0: 0,
            state_out_ch: 0,
            state_out_len: 0,
            rand: Randomiser::new(),
            block_crc_calc: BlockCrc::new(),
            total_in: 0,
            total_out: 0,
        })
    }

    /// Move data through the decompressor. Returns `Ok` while the stream
    /// wants more input or more output room, `StreamEnd` once the footer
    /// has been read and every plaintext byte delivered.
    pub fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<Progress> {
        if self.failed {
            return Err(Error::Sequence);
        }
        let mut pos = 0_usize;
        let mut out_pos = 0_usize;
        let result = self.advance(input, &mut pos, output, &mut out_pos);
        self.total_in += pos as u64;
        self.total_out += out_pos as u64;
        match result {
            Ok(status) => Ok(Progress {
                status,
                consumed: pos,
                produced: out_pos,
            }),
            Err(e) => {
                self.failed = true;
                Err(e)
            }
        }
    }

    /// Total compressed bytes taken in so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total plaintext bytes handed out so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    fn advance(
        &mut self,
        input: &[u8],
        pos: &mut usize,
        output: &mut [u8],
        out_pos: &mut usize,
    ) -> Result<Status> {
        loop {
            match self.state {
                State::Idle => return Err(Error::Sequence),
                State::Output => match self.un_rle_output(output, out_pos)? {
                    Emit::NeedOutput => return Ok(Status::Ok),
                    Emit::BlockDone => {
                        let calc = self.block_crc_calc.finalise();
                        if calc != self.stored_block_crc {
                            error!(
                                "Block {} CRC failed: found {:08x} looking for {:08x}.",
                                self.block_no, calc, self.stored_block_crc
                            );
                            return Err(Error::Data);
                        }
                        debug!("Block {} CRCs matched.", self.block_no);
                        self.combined_crc = do_stream_crc(self.combined_crc, calc);
                        self.block_crc_calc = BlockCrc::new();
                        self.state = State::BlkByte1;
                    }
                },
                _ => match self.parse(input, pos)? {
                    Parse::NeedInput => return Ok(Status::Ok),
                    Parse::OutputReady => {}
                    Parse::StreamEnd => return Ok(Status::StreamEnd),
                },
            }
        }
    }

    /// The field-level parser. Each arm reads exactly one field (or one
    /// step of a repeated field) and moves to the next state; a dry input
    /// window suspends right where it is.
    fn parse(&mut self, input: &[u8], pos: &mut usize) -> Result<Parse> {
        loop {
            match self.state {
                State::Magic1 => {
                    if need!(self.bits.byte(input, pos)) != b'B' {
                        return Err(Error::DataMagic);
                    }
                    self.state = State::Magic2;
                }
                State::Magic2 => {
                    if need!(self.bits.byte(input, pos)) != b'Z' {
                        return Err(Error::DataMagic);
                    }
                    self.state = State::Magic3;
                }
                State::Magic3 => {
                    if need!(self.bits.byte(input, pos)) != b'h' {
                        return Err(Error::DataMagic);
                    }
                    self.state = State::MagicLevel;
                }
                State::MagicLevel => {
                    let b = need!(self.bits.byte(input, pos));
                    if !(b'1'..=b'9').contains(&b) {
                        return Err(Error::DataMagic);
                    }
                    self.level = (b - b'0') as u32;
                    self.block_size = self.level as usize * BLOCK_UNIT;
                    info!("Found a valid bzip2 signature, {}00k blocks.", self.level);
                    if self.small {
                        self.ll16
                            .try_reserve_exact(self.block_size)
                            .map_err(|_| Error::Mem)?;
                        self.ll16.resize(self.block_size, 0);
                        self.ll4
                            .try_reserve_exact((self.block_size + 1) >> 1)
                            .map_err(|_| Error::Mem)?;
                        self.ll4.resize((self.block_size + 1) >> 1, 0);
                    } else {
                        self.tt
                            .try_reserve_exact(self.block_size)
                            .map_err(|_| Error::Mem)?;
                        self.tt.resize(self.block_size, 0);
                    }
                    self.state = State::BlkByte1;
                }
                State::BlkByte1 => match need!(self.bits.byte(input, pos)) {
                    0x31 => self.state = State::BlkMagic2,
                    0x17 => self.state = State::EndMagic2,
                    _ => return Err(Error::Data),
                },
                State::BlkMagic2 => {
                    if need!(self.bits.bint(24, input, pos)) != 0x41_5926 {
                        return Err(Error::Data);
                    }
                    self.state = State::BlkMagic3;
                }
                State::BlkMagic3 => {
                    if need!(self.bits.bint(16, input, pos)) != 0x5359 {
                        return Err(Error::Data);
                    }
                    self.block_no += 1;
                    debug!("Found a valid header for block {}.", self.block_no);
                    self.state = State::BlockCrc;
                }
                State::BlockCrc => {
                    self.stored_block_crc = need!(self.bits.bint(32, input, pos));
                    self.state = State::RandBit;
                }
                State::RandBit => {
                    self.block_randomised = need!(self.bits.bint(1, input, pos)) == 1;
                    self.state = State::OrigPtr;
                }
                State::OrigPtr => {
                    let v = need!(self.bits.bint(24, input, pos)) as usize;
                    if v > 10 + self.block_size {
                        return Err(Error::Data);
                    }
                    self.orig_ptr = v;
                    self.state = State::MapCoarse;
                }
                State::MapCoarse => {
                    let w = need!(self.bits.bint(16, input, pos)) as u16;
                    self.sym_map_words.clear();
                    self.sym_map_words.push(w);
                    self.i = 0;
                    self.state = State::MapFine;
                }
                State::MapFine => {
                    while self.i < 16 {
                        if self.sym_map_words[0] & (0x8000 >> self.i) != 0 {
                            let w = need!(self.bits.bint(16, input, pos)) as u16;
                            self.sym_map_words.push(w);
                        }
                        self.i += 1;
                    }
                    self.symbol_set = decode_sym_map(&self.sym_map_words);
                    if self.symbol_set.is_empty() {
                        return Err(Error::Data);
                    }
                    self.alpha_size = self.symbol_set.len() + 2;
                    self.eob = self.symbol_set.len() as u16 + 1;
                    debug!(
                        "Found {} symbols for block {}.",
                        self.symbol_set.len(),
                        self.block_no
                    );
                    self.state = State::Groups;
                }
                State::Groups => {
                    self.n_groups = need!(self.bits.bint(3, input, pos)) as usize;
                    if !(2..=MAX_TABLES).contains(&self.n_groups) {
                        return Err(Error::Data);
                    }
                    self.state = State::SelCount;
                }
                State::SelCount => {
                    self.n_selectors = need!(self.bits.bint(15, input, pos)) as usize;
                    if self.n_selectors < 1 {
                        return Err(Error::Data);
                    }
                    self.selector_mtf.clear();
                    self.i = 0;
                    self.j = 0;
                    self.state = State::Selectors;
                }
                State::Selectors => {
                    while self.i < self.n_selectors {
                        loop {
                            if need!(self.bits.bint(1, input, pos)) == 0 {
                                break;
                            }
                            self.j += 1;
                            if self.j >= self.n_groups {
                                return Err(Error::Data);
                            }
                        }
                        // Selectors past the usable maximum decode but are
                        // dropped; some encoders round their count up.
                        if self.i < MAX_SELECTORS {
                            self.selector_mtf.push(self.j as u8);
                        }
                        self.j = 0;
                        self.i += 1;
                    }
                    if self.n_selectors > MAX_SELECTORS {
                        warn!(
                            "Found {} selectors, but the maximum is {}; ignoring the excess.",
                            self.n_selectors, MAX_SELECTORS
                        );
                        self.n_selectors = MAX_SELECTORS;
                    }

                    // Undo the move-to-front on the table numbers.
                    let mut pos_arr: [u8; MAX_TABLES] = [0, 1, 2, 3, 4, 5];
                    self.selectors.clear();
                    for &v in &self.selector_mtf {
                        let v = v as usize;
                        let tmp = pos_arr[v];
                        for k in (1..=v).rev() {
                            pos_arr[k] = pos_arr[k - 1];
                        }
                        pos_arr[0] = tmp;
                        self.selectors.push(tmp);
                    }
                    debug!(
                        "Decoded {} selectors for the {} tables in block {}.",
                        self.n_selectors, self.n_groups, self.block_no
                    );
                    self.t = 0;
                    self.state = State::Coding1;
                }
                State::Coding1 => {
                    self.curr = need!(self.bits.bint(5, input, pos)) as i32;
                    self.i = 0;
                    self.state = State::Coding2;
                }
                State::Coding2 => {
                    if self.i >= self.alpha_size {
                        self.t += 1;
                        if self.t < self.n_groups {
                            self.state = State::Coding1;
                        } else {
                            self.begin_mtf_decode()?;
                        }
                        continue;
                    }
                    if !(1..=MAX_CODE_LEN_DECODE as i32).contains(&self.curr) {
                        return Err(Error::Data);
                    }
                    if need!(self.bits.bint(1, input, pos)) == 0 {
                        self.len[self.t][self.i] = self.curr as u8;
                        self.i += 1;
                    } else {
                        self.state = State::Coding3;
                    }
                }
                State::Coding3 => {
                    if need!(self.bits.bint(1, input, pos)) == 0 {
                        self.curr += 1;
                    } else {
                        self.curr -= 1;
                    }
                    self.state = State::Coding2;
                }
                State::MtfVec => {
                    self.zvec = need!(self.bits.bint(self.zn, input, pos)) as i32;
                    self.state = State::MtfCheck;
                }
                State::MtfCheck => {
                    if self.zn > MAX_CODE_LEN_DECODE {
                        return Err(Error::Data);
                    }
                    let table = &self.tables[self.g_sel];
                    if self.zvec <= table.limit[self.zn as usize] {
                        let idx = self.zvec - table.base[self.zn as usize];
                        if !(0..MAX_ALPHA_SIZE as i32).contains(&idx) {
                            return Err(Error::Data);
                        }
                        let sym = table.perm[idx as usize];
                        self.consume_sym(sym)?;
                        if self.state == State::Output {
                            return Ok(Parse::OutputReady);
                        }
                    } else {
                        self.zn += 1;
                        self.state = State::MtfBit;
                    }
                }
                State::MtfBit => {
                    let bit = need!(self.bits.bint(1, input, pos)) as i32;
                    self.zvec = (self.zvec << 1) | bit;
                    self.state = State::MtfCheck;
                }
                State::EndMagic2 => {
                    if need!(self.bits.bint(24, input, pos)) != 0x72_4538 {
                        return Err(Error::Data);
                    }
                    self.state = State::EndMagic3;
                }
                State::EndMagic3 => {
                    if need!(self.bits.bint(16, input, pos)) != 0x5090 {
                        return Err(Error::Data);
                    }
                    self.state = State::CombinedCrc;
                }
                State::CombinedCrc => {
                    let stored = need!(self.bits.bint(32, input, pos));
                    if stored != self.combined_crc {
                        error!(
                            "Stream CRC failed: found {:08x} looking for {:08x}.",
                            self.combined_crc, stored
                        );
                        return Err(Error::Data);
                    }
                    info!("Stream CRCs matched: {:08x}.", stored);
                    self.state = State::Idle;
                    return Ok(Parse::StreamEnd);
                }
                State::Output | State::Idle => unreachable!("parser re-entered a non-parse state"),
            }
        }
    }

    /// All coding tables are in: build the decode tables and set up the
    /// MTF/RLE2 symbol phase.
    fn begin_mtf_decode(&mut self) -> Result<()> {
        self.tables.clear();
        for t in 0..self.n_groups {
            self.tables
                .push(create_decode_table(&self.len[t][..self.alpha_size]));
        }
        self.unzftab = [0; 256];
        for (idx, slot) in self.mtf.iter_mut().enumerate().take(self.symbol_set.len()) {
            *slot = idx as u8;
        }
        self.nblock = 0;
        self.group_no = -1;
        self.group_pos = 0;
        self.in_run = false;
        self.request_sym()
    }

    /// Group bookkeeping for the next symbol, then hand off to the bit
    /// states. Runs exactly once per symbol.
    fn request_sym(&mut self) -> Result<()> {
        if self.group_pos == 0 {
            self.group_no += 1;
            if self.group_no as usize >= self.n_selectors {
                return Err(Error::Data);
            }
            self.group_pos = GROUP_SIZE as i32;
            self.g_sel = self.selectors[self.group_no as usize] as usize;
        }
        self.group_pos -= 1;
        self.zn = self.tables[self.g_sel].min_len;
        self.state = State::MtfVec;
        Ok(())
    }

    /// One decoded MTF symbol: extend or flush the pending zero run, stop
    /// at EOB, or undo the MTF for a literal.
    fn consume_sym(&mut self, sym: u16) -> Result<()> {
        if sym == RUNA || sym == RUNB {
            if !self.in_run {
                self.in_run = true;
                self.run_acc = -1;
                self.run_n = 1;
            }
            if self.run_n >= RUN_CAP {
                return Err(Error::Data);
            }
            if sym == RUNA {
                self.run_acc += self.run_n;
            } else {
                self.run_acc += self.run_n << 1;
            }
            self.run_n <<= 1;
            return self.request_sym();
        }

        if self.in_run {
            self.in_run = false;
            let es = self.run_acc + 1;
            let uc = self.mtf[0];
            let byte = self.symbol_set[uc as usize];
            if self.nblock as i64 + es > self.block_size as i64 {
                return Err(Error::Data);
            }
            self.unzftab[byte as usize] += es as u32;
            for _ in 0..es {
                self.push_block_byte(byte);
            }
        }

        if sym == self.eob {
            return self.finish_block_setup();
        }

        if self.nblock >= self.block_size {
            return Err(Error::Data);
        }

        // Undo the MTF: the symbol names a list position, whose entry moves
        // to the front.
        let mut nn = (sym - 1) as usize;
        let uc = self.mtf[nn];
        while nn > 3 {
            self.mtf[nn] = self.mtf[nn - 1];
            self.mtf[nn - 1] = self.mtf[nn - 2];
            self.mtf[nn - 2] = self.mtf[nn - 3];
            self.mtf[nn - 3] = self.mtf[nn - 4];
            nn -= 4;
        }
        while nn > 0 {
            self.mtf[nn] = self.mtf[nn - 1];
            nn -= 1;
        }
        self.mtf[0] = uc;

        let byte = self.symbol_set[uc as usize];
        self.unzftab[byte as usize] += 1;
        self.push_block_byte(byte);
        self.request_sym()
    }

    #[inline]
    fn push_block_byte(&mut self, byte: u8) {
        if self.small {
            self.ll16[self.nblock] = byte as u16;
        } else {
            self.tt[self.nblock] = byte as u32;
        }
        self.nblock += 1;
    }

    /// The end-of-block symbol arrived: validate the header fields against
    /// the decoded block and build the inverse-BWT walker.
    fn finish_block_setup(&mut self) -> Result<()> {
        debug!("Block {}: {} bytes to reconstruct.", self.block_no, self.nblock);
        if self.orig_ptr >= self.nblock {
            return Err(Error::Data);
        }
        for &count in self.unzftab.iter() {
            if count as usize > self.nblock {
                return Err(Error::Data);
            }
        }
        self.cftab[0] = 0;
        for i in 0..256 {
            self.cftab[i + 1] = self.unzftab[i];
        }
        for i in 1..=256 {
            self.cftab[i] += self.cftab[i - 1];
        }
        for i in 0..=256 {
            if self.cftab[i] as usize > self.nblock {
                return Err(Error::Data);
            }
        }

        self.state_out_len = 0;
        self.state_out_ch = 0;
        self.rand = Randomiser::new();
        self.block_crc_calc = BlockCrc::new();

        if self.small {
            // T vector from a scratch copy of cftab, then invert it in
            // place by pointer reversal from the original rotation.
            self.cftab_copy = self.cftab;
            for i in 0..self.nblock {
                let uc = self.ll16[i] as usize;
                self.set_ll(i as u32, self.cftab_copy[uc]);
                self.cftab_copy[uc] += 1;
            }
            let orig = self.orig_ptr as u32;
            let mut i = orig;
            let mut j = self.get_ll(i);
            loop {
                let tmp = self.get_ll(j);
                self.set_ll(j, i);
                i = j;
                j = tmp;
                if i == orig {
                    break;
                }
            }
            self.t_pos = orig;
        } else {
            for i in 0..self.nblock {
                let uc = (self.tt[i] & 0xff) as usize;
                self.tt[self.cftab[uc] as usize] |= (i as u32) << 8;
                self.cftab[uc] += 1;
            }
            self.t_pos = self.tt[self.orig_ptr] >> 8;
        }

        self.nblock_used = 0;
        self.k0 = self.next_block_byte()?;
        self.state = State::Output;
        Ok(())
    }

    /// 20-bit linked-list pointers, 16 bits in `ll16` and a nibble in `ll4`.
    #[inline]
    fn get_ll(&self, i: u32) -> u32 {
        let nibble = (self.ll4[(i >> 1) as usize] >> ((i << 2) & 0x4)) & 0xf;
        ((nibble as u32) << 16) | self.ll16[i as usize] as u32
    }

    #[inline]
    fn set_ll(&mut self, i: u32, n: u32) {
        self.ll16[i as usize] = (n & 0xffff) as u16;
        let slot = (i >> 1) as usize;
        if i & 1 == 0 {
            self.ll4[slot] = (self.ll4[slot] & 0xf0) | (n >> 16) as u8;
        } else {
            self.ll4[slot] = (self.ll4[slot] & 0x0f) | (((n >> 16) << 4) as u8);
        }
    }

    /// Binary search over cftab: which byte's cumulative range holds `indx`?
    fn index_into_f(&self, indx: u32) -> u8 {
        let mut nb = 0_usize;
        let mut na = 256_usize;
        loop {
            let mid = (nb + na) >> 1;
            if indx >= self.cftab[mid] {
                nb = mid;
            } else {
                na = mid;
            }
            if na - nb == 1 {
                return nb as u8;
            }
        }
    }

    /// Pull the next byte of the un-BWT'd block, de-randomising if the
    /// block asked for it.
    #[inline]
    fn next_block_byte(&mut self) -> Result<u8> {
        if self.t_pos as usize >= self.block_size {
            return Err(Error::Data);
        }
        let mut byte = if self.small {
            let b = self.index_into_f(self.t_pos);
            self.t_pos = self.get_ll(self.t_pos);
            b
        } else {
            self.t_pos = self.tt[self.t_pos as usize];
            let b = (self.t_pos & 0xff) as u8;
            self.t_pos >>= 8;
            b
        };
        self.nblock_used += 1;
        if self.block_randomised {
            byte ^= self.rand.next_mask();
        }
        Ok(byte)
    }

    /// The output machine: walk the inverse BWT, undo RLE1, and emit into
    /// the caller's window, suspending when it fills.
    fn un_rle_output(&mut self, output: &mut [u8], out_pos: &mut usize) -> Result<Emit> {
        loop {
            // Finish an existing run first.
            while self.state_out_len > 0 {
                if *out_pos >= output.len() {
                    return Ok(Emit::NeedOutput);
                }
                output[*out_pos] = self.state_out_ch;
                self.block_crc_calc.update(self.state_out_ch);
                *out_pos += 1;
                self.state_out_len -= 1;
            }

            // Can a new run be started?
            if self.nblock_used == self.nblock + 1 {
                return Ok(Emit::BlockDone);
            }
            if self.nblock_used > self.nblock + 1 {
                return Err(Error::Data);
            }

            self.state_out_len = 1;
            self.state_out_ch = self.k0;
            let k1 = self.next_block_byte()?;
            if self.nblock_used == self.nblock + 1 {
                continue;
            }
            if k1 != self.k0 {
                self.k0 = k1;
                continue;
            }

            self.state_out_len = 2;
            let k1 = self.next_block_byte()?;
            if self.nblock_used == self.nblock + 1 {
                continue;
            }
            if k1 != self.k0 {
                self.k0 = k1;
                continue;
            }

            self.state_out_len = 3;
            let k1 = self.next_block_byte()?;
            if self.nblock_used == self.nblock + 1 {
                continue;
            }
            if k1 != self.k0 {
                self.k0 = k1;
                continue;
            }

            // Four in a row: the next byte is the extra run length.
            let k1 = self.next_block_byte()?;
            self.state_out_len = k1 as u32 + 4;
            self.k0 = self.next_block_byte()?;
        }
    }
}
