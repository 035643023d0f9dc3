//! Command line parsing

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};

pub const USAGE: &str = "\
Usage: abtest-render [OPTIONS] -o <OUT.wav> <IN.wav>...

Each input file feeds one input group, in order.

Options:
  -o, --output <PATH>      Rendered WAV file (32-bit float)
  -c, --config <PATH>      Config file (default: ~/.config/abtest/config.yaml)
  -v, --variant <ID>       Tester variant, e.g. x4_stereo (overrides config)
  -s, --select <N>         Audible group, 1-based; grid position in blind mode
  -g, --gain <N=LINEAR>    Input gain of group N (repeatable)
      --mono               Mix the stereo output down to mono
      --blind              Run a blind test; --select picks a grid position
      --enable <N>         Add group N to the blind test (repeatable)
      --seed <N>           Shuffle seed (overrides config)
      --buffer <FRAMES>    Host buffer size (default: 512)
      --dump               Print the engine state as JSON when done
  -h, --help               Show this help
";

/// Parsed command line
#[derive(Debug, Default)]
pub struct Args {
    pub output: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
    pub config: Option<PathBuf>,
    pub variant: Option<String>,
    pub select: usize,
    /// (1-based group, linear gain)
    pub gains: Vec<(usize, f32)>,
    pub mono: bool,
    pub blind: bool,
    pub enable: Vec<usize>,
    pub seed: Option<u64>,
    pub buffer: usize,
    pub dump: bool,
    pub help: bool,
}

impl Args {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args {
            buffer: 512,
            ..Default::default()
        };
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("Missing value for {}", name))
            };
            match arg.as_str() {
                "-h" | "--help" => parsed.help = true,
                "-o" | "--output" => parsed.output = Some(value(&arg)?.into()),
                "-c" | "--config" => parsed.config = Some(value(&arg)?.into()),
                "-v" | "--variant" => parsed.variant = Some(value(&arg)?),
                "-s" | "--select" => {
                    parsed.select = value(&arg)?.parse().context("--select expects a number")?
                }
                "-g" | "--gain" => parsed.gains.push(parse_gain(&value(&arg)?)?),
                "--mono" => parsed.mono = true,
                "--blind" => parsed.blind = true,
                "--enable" => parsed
                    .enable
                    .push(value(&arg)?.parse().context("--enable expects a group number")?),
                "--seed" => parsed.seed = Some(value(&arg)?.parse().context("--seed expects an integer")?),
                "--buffer" => {
                    parsed.buffer = value(&arg)?.parse().context("--buffer expects a frame count")?
                }
                "--dump" => parsed.dump = true,
                s if s.starts_with('-') && s.len() > 1 => bail!("Unknown option {}", s),
                _ => parsed.inputs.push(PathBuf::from(&arg)),
            }
        }

        if parsed.help {
            return Ok(parsed);
        }
        if parsed.output.is_none() {
            bail!("No output file given (-o)");
        }
        if parsed.inputs.is_empty() {
            bail!("No input files given");
        }
        if parsed.buffer == 0 {
            bail!("--buffer must be at least 1 frame");
        }
        Ok(parsed)
    }
}

fn parse_gain(spec: &str) -> Result<(usize, f32)> {
    let (group, gain) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("--gain expects N=LINEAR, got {:?}", spec))?;
    let group: usize = group.trim().parse().context("Invalid group in --gain")?;
    let gain: f32 = gain.trim().parse().context("Invalid gain in --gain")?;
    if group == 0 {
        bail!("Groups are numbered from 1");
    }
    Ok((group, gain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Args> {
        Args::parse(line.split_whitespace().map(String::from))
    }

    #[test]
    fn test_full_command_line() {
        let args = parse("-v x4_mono -s 2 -g 2=0.5 --gain 1=2 --blind --enable 3 --seed 9 -o out.wav a.wav b.wav")
            .unwrap();
        assert_eq!(args.variant.as_deref(), Some("x4_mono"));
        assert_eq!(args.select, 2);
        assert_eq!(args.gains, vec![(2, 0.5), (1, 2.0)]);
        assert!(args.blind);
        assert_eq!(args.enable, vec![3]);
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.output, Some(PathBuf::from("out.wav")));
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.buffer, 512);
    }

    #[test]
    fn test_errors() {
        assert!(parse("a.wav").is_err());
        assert!(parse("-o out.wav").is_err());
        assert!(parse("-o out.wav --frobnicate a.wav").is_err());
        assert!(parse("-o out.wav -g 0=1 a.wav").is_err());
        assert!(parse("-o out.wav -g 1 a.wav").is_err());
        assert!(parse("-o out.wav --buffer 0 a.wav").is_err());
        assert!(parse("-o").is_err());
    }

    #[test]
    fn test_help_skips_validation() {
        assert!(parse("--help").unwrap().help);
    }
}
