/// Configuration


use crate::common::errors::Error;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use log::warn;


#[derive(Clone)]
pub struct ConfigMt {
    conf: Arc<Mutex<Config>>,
}

impl ConfigMt {
    pub fn new() -> ConfigMt {
        ConfigMt {
            conf: Arc::new(Mutex::new(Config::new()))
        }
    }

    pub fn get_conf(&self) -> Result<MutexGuard<Config>, Error> {
        self.conf.lock().map_err(|_| Error::lock_error())
    }
}

macro_rules! gen_config {
    ( $( $name:ident, $data_type:ty, $default_val:expr, $get_fn:ident, $set_fn:ident, $str_name:literal, $conv_fn:path ), *) => {
        pub struct Config {
            $(
                $name: $data_type,
            )*
        }

        impl Config {

            pub fn new() -> Config {
                Config {
                    $(
                        $name: $default_val,
                    )*
                }
            }

            $(
                pub fn $get_fn(&self) -> &$data_type {
                    &self.$name
                }

                pub fn $set_fn(&mut self, $name: $data_type) {
                    self.$name = $name;
                }
            )*

            fn process_config_file_entry(&mut self, name: &str, val: &str) -> Result<(), Error> {

                match name {
                    $(
                        $str_name => { self.$name = $conv_fn(val)?; },
                    )*
                    _ => warn!("Skipping unexpected config entry: {}", name)
                };

                Ok(())
            }
        }
    }
}


impl Config {

    /// Read `name = value` lines from a file; lines starting with `#` are comments.
    pub fn load(&mut self, file_path: &str) -> Result<(), Error> {
        let f = BufReader::new(OpenOptions::new()
            .create(false)
            .write(false)
            .read(true)
            .truncate(false)
            .open(file_path)?);

        for line in f.lines() {
            let line = line?;
            if let Some((name, val)) = Self::process_config_file_line(&line) {
                self.process_config_file_entry(name, val)?;
            }
        }

        Ok(())
    }

    fn process_config_file_line(s: &str) -> Option<(&str, &str)> {
        let line = s.as_bytes();
        let mut p = 0;

        // skip space
        while p < line.len() && (line[p] == b' ' || line[p] == b'\t') { p += 1; };

        // check for empty or comment line
        if p == line.len() || line[p] == b'#' { return None }

        // read 'name' part
        let p1 = p;
        while p < line.len() && (line[p].is_ascii_alphanumeric() || line[p] == b'_' || line[p] == b'-') {
            p += 1;
        }
        if p == p1 { return None }
        let p2 = p;

        // read '='
        while p < line.len() && (line[p] == b' ' || line[p] == b'\t') { p += 1; };
        if p == line.len() || line[p] != b'=' { return None }
        p += 1;
        while p < line.len() && (line[p] == b' ' || line[p] == b'\t') { p += 1; };

        // return 'name' and 'val'
        Some((&s[p1..p2], s[p..].trim_end()))
    }

    fn load_string(value: &str) -> Result<String, Error> {
        Ok(String::from(value))
    }

    fn load_u64_val(value: &str) -> Result<u64, Error> {
        let ret = str::parse::<u64>(value)?;
        Ok(ret)
    }

    fn load_i64_val(value: &str) -> Result<i64, Error> {
        let ret = str::parse::<i64>(value)?;
        Ok(ret)
    }
}

gen_config![store_path,         String, "blocks.dat".to_owned(), get_store_path,         set_store_path,         "store_path", Config::load_string,
    write_buffer_size,          i64,    64*1024*1024,            get_write_buffer_size,  set_write_buffer_size,  "write_buffer_size", Config::load_i64_val,
    eviction_policy,            String, "fifo".to_owned(),       get_eviction_policy,    set_eviction_policy,    "eviction_policy", Config::load_string,
    store_size_limit,           u64,    0,                       get_store_size_limit,   set_store_size_limit,   "store_size_limit", Config::load_u64_val];
