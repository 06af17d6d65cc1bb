//! The compression stream handle.
//!
//! A `CompressStream` is fed plaintext through caller-supplied input
//! windows and hands back the framed bitstream through caller-supplied
//! output windows. Bytes run through the RLE1 intake into the block
//! buffer; when the buffer reaches its fill line (or the caller flushes or
//! finishes) the block goes through the full pipeline and its bits queue up
//! for draining. The handle owns every buffer, sized once from the level at
//! construction, and is fully resumable: any amount of input and output may
//! be moved per call.

use log::{debug, info};

use crate::bitstream::bitwriter::BitWriter;
use crate::compression::compress_block::{compress_block, stream_footer, stream_header};
use crate::error::{Action, Error, Progress, Result, Status};
use crate::tools::crc::{do_stream_crc, BlockCrc};
use crate::tools::rle1::Rle1Intake;

/// Bytes of block capacity per compression level.
pub const BLOCK_UNIT: usize = 100_000;
/// Slack past the nominal block size; a run flushed right at the fill line
/// may briefly overshoot it.
const BLOCK_SLACK: usize = 34;
/// The fill line sits short of the block size so the overshoot always fits.
const FILL_MARGIN: usize = 19;

/// Where the handle is in the stream's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Running,
    Flushing,
    Finishing,
    /// Stream complete; only finalisation is valid.
    Done,
}

/// Whether the handle is absorbing input or draining a compressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Input,
    Output,
}

/// A resumable bzip2 compressor over caller-supplied byte windows.
pub struct CompressStream {
    mode: Mode,
    phase: Phase,
    level: u32,
    work_factor: u32,
    bw: BitWriter,
    block: Vec<u8>,
    nblock_max: usize,
    rle: Rle1Intake,
    in_use: [bool; 256],
    block_crc: BlockCrc,
    combined_crc: u32,
    block_no: u32,
    end_written: bool,
    total_in: u64,
    total_out: u64,
}

impl CompressStream {
    /// Create a compressor. `level` selects the block size
    /// (`level * 100000` bytes, 1..=9); `work_factor` (0..=250, 0 meaning
    /// 30) controls how hard the main block sort tries before falling back.
    pub fn new(level: u32, work_factor: u32) -> Result<Self> {
        crate::config_check()?;
        if !(1..=9).contains(&level) {
            return Err(Error::Param("level must be 1..=9"));
        }
        if work_factor > 250 {
            return Err(Error::Param("work factor must be 0..=250"));
        }
        let n = level as usize * BLOCK_UNIT;
        let mut block = Vec::new();
        block
            .try_reserve_exact(n + BLOCK_SLACK)
            .map_err(|_| Error::Mem)?;

        info!("Compressing with {}00k blocks.", level);
        Ok(Self {
            mode: Mode::Running,
            phase: Phase::Input,
            level,
            work_factor: if work_factor == 0 { 30 } else { work_factor },
            bw: BitWriter::new(n / 2 + 600),
            block,
            nblock_max: n - FILL_MARGIN,
            rle: Rle1Intake::new(),
            in_use: [false; 256],
            block_crc: BlockCrc::new(),
            combined_crc: 0,
            block_no: 0,
            end_written: false,
            total_in: 0,
            total_out: 0,
        })
    }

    /// Move data through the compressor. Consumes from `input`, produces
    /// into `output`, and reports how far each cursor moved. `Run` may be
    /// followed by more `Run`s; once `Flush` or `Finish` is given it must be
    /// repeated until the handle reports `RunOk` (flush complete) or
    /// `StreamEnd`.
    pub fn compress(&mut self, input: &[u8], output: &mut [u8], action: Action) -> Result<Progress> {
        match (self.mode, action) {
            (Mode::Done, _) => return Err(Error::Sequence),
            (Mode::Running, Action::Flush) => self.mode = Mode::Flushing,
            (Mode::Running, Action::Finish) => self.mode = Mode::Finishing,
            (Mode::Running, Action::Run) => {}
            (Mode::Flushing, Action::Flush) => {}
            (Mode::Finishing, Action::Finish) => {}
            _ => return Err(Error::Sequence),
        }

        let mut consumed = 0_usize;
        let mut produced = 0_usize;

        let status = loop {
            match self.phase {
                Phase::Output => {
                    self.bw.drain_into(output, &mut produced);
                    if self.bw.pending() > 0 {
                        // Output window is full; pick up here next call.
                        break self.stalled_status();
                    }
                    self.phase = Phase::Input;
                    if self.end_written {
                        self.mode = Mode::Done;
                        break Status::StreamEnd;
                    }
                    if self.mode == Mode::Flushing
                        && consumed == input.len()
                        && self.block.is_empty()
                        && self.rle.is_idle()
                    {
                        self.mode = Mode::Running;
                        break Status::RunOk;
                    }
                }
                Phase::Input => {
                    // Absorb input until the window empties or the block
                    // reaches its fill line.
                    while consumed < input.len() && self.block.len() < self.nblock_max {
                        self.rle.push(
                            input[consumed],
                            &mut self.block,
                            &mut self.in_use,
                            &mut self.block_crc,
                        );
                        consumed += 1;
                    }

                    if self.block.len() >= self.nblock_max {
                        // A run in progress is left pending: it continues
                        // into the next block.
                        self.close_block(false, false);
                        self.phase = Phase::Output;
                        continue;
                    }
                    // Block not full, input exhausted.
                    match self.mode {
                        Mode::Running => break Status::RunOk,
                        Mode::Flushing => {
                            self.close_block(false, true);
                            self.phase = Phase::Output;
                        }
                        Mode::Finishing => {
                            self.close_block(true, true);
                            self.end_written = true;
                            self.phase = Phase::Output;
                        }
                        Mode::Done => break Status::StreamEnd,
                    }
                }
            }
        };

        self.total_in += consumed as u64;
        self.total_out += produced as u64;
        Ok(Progress {
            status,
            consumed,
            produced,
        })
    }

    fn stalled_status(&self) -> Status {
        match self.mode {
            Mode::Running => Status::RunOk,
            Mode::Flushing => Status::FlushOk,
            Mode::Finishing => Status::FinishOk,
            Mode::Done => Status::StreamEnd,
        }
    }

    /// Close out the current block: compress and frame it if it holds
    /// anything, and on the last block write the stream footer. `flush_rle`
    /// settles the pending run into this block; a mid-stream close leaves
    /// it pending instead.
    fn close_block(&mut self, is_last: bool, flush_rle: bool) {
        if flush_rle {
            self.rle
                .finish(&mut self.block, &mut self.in_use, &mut self.block_crc);
        }

        if !self.block.is_empty() {
            let crc = std::mem::take(&mut self.block_crc).finalise();
            self.combined_crc = do_stream_crc(self.combined_crc, crc);
            self.block_no += 1;
            if self.block_no == 1 {
                stream_header(&mut self.bw, self.level);
            }
            debug!("Starting block {}, crc {:08x}.", self.block_no, crc);
            compress_block(&mut self.bw, &self.block, crc, self.work_factor);

            self.block.clear();
            self.in_use = [false; 256];
        }

        if is_last {
            // An empty stream still gets a header, a footer, and a
            // combined CRC of zero.
            if self.block_no == 0 {
                stream_header(&mut self.bw, self.level);
            }
            stream_footer(&mut self.bw, self.combined_crc);
            info!(
                "Finished stream: {} block(s), combined crc {:08x}.",
                self.block_no, self.combined_crc
            );
        }
    }

    /// Total plaintext bytes taken in so far.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total compressed bytes handed out so far.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }
}
