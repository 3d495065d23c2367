// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Overrides `cz_utils::config` tunables from `--flag=value` arguments,
//! applied once at start-up before any search begins: the CLI wins over
//! the environment for every config key.

use regex::Regex;

use cz_utils::config;

lazy_static! {
    static ref FLAG: Regex = Regex::new(r"^--([a-z][a-z0-9-]*)=(.+)$").unwrap();
}

/// Applies every `--flag=value` argument it recognizes, returning the
/// arguments it did not (the subcommand and its own positional args).
pub fn apply(args: &[String]) -> Vec<String> {
    let mut rest = Vec::with_capacity(args.len());

    for arg in args {
        match FLAG.captures(arg) {
            Some(captures) => apply_one(&captures[1], &captures[2]),
            None => rest.push(arg.clone())
        }
    }

    rest
}

fn apply_one(flag: &str, value: &str) {
    match flag {
        "threads" => parse_into(&config::NUM_THREADS, value),
        "num-games" => parse_into(&config::NUM_GAMES, value),
        "nodes" => parse_into(&config::NUM_NODES, value),
        "movetime-ms" => parse_into(&config::MOVETIME_MS, value),
        "cpuct" => parse_into(&config::CPUCT, value),
        "fpu-reduction" => parse_into(&config::FPU_REDUCTION, value),
        "policy-softmax-temp" => parse_into(&config::POLICY_SOFTMAX_TEMP, value),
        "noise" => parse_into(&config::NOISE, value),
        "temperature" => parse_into(&config::TEMPERATURE, value),
        "tempdecay-moves" => parse_into(&config::TEMPDECAY_MOVES, value),
        "cache-size" => parse_into(&config::CACHE_SIZE, value),
        "minibatch-size" => parse_into(&config::MINIBATCH_SIZE, value),
        "max-prefetch" => parse_into(&config::MAX_PREFETCH, value),
        "multipv" => parse_into(&config::MULTIPV, value),
        "verbose-move-stats" => parse_into(&config::VERBOSE_MOVE_STATS, value),
        "resign-threshold" => parse_into(&config::RESIGN_THRESHOLD, value),
        "resign-plies" => parse_into(&config::RESIGN_PLIES, value),
        "draw-threshold" => parse_into(&config::DRAW_THRESHOLD, value),
        "draw-plies" => parse_into(&config::DRAW_PLIES, value),
        "weights" => config::set_string(&config::WEIGHTS, Some(value.to_string())),
        "backend" => config::set_string(&config::BACKEND, value.to_string()),
        // backend-specific tuning is opaque to this workspace's reference
        // backend; accepted and ignored rather than rejected outright so a
        // config file shared with a real backend does not fail to parse here.
        "backend-opts" => {},
        _ => eprintln!("cz: ignoring unknown option '--{}'", flag)
    }
}

fn parse_into<T>(lock: &std::sync::RwLock<T>, value: &str)
    where T: Copy + std::str::FromStr
{
    match value.parse() {
        Ok(parsed) => config::set(lock, parsed),
        Err(_) => eprintln!("cz: could not parse '{}' as a config value", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_flags_are_consumed() {
        let args = vec!["--threads=4".to_string(), "search".to_string()];
        let rest = apply(&args);

        assert_eq!(rest, vec!["search".to_string()]);
        assert_eq!(config::get(&config::NUM_THREADS), 4);

        config::set(&config::NUM_THREADS, 16);
    }

    #[test]
    fn non_flag_arguments_pass_through_untouched() {
        let args = vec!["search".to_string(), "startpos".to_string()];
        let rest = apply(&args);

        assert_eq!(rest, args);
    }
}
