//!
//! Error codes and related functions
//!


use std;


#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    repr: ErrorRepr
}


impl Error {

    fn new(kind: ErrorKind, repr: ErrorRepr) -> Error {
        Error {
            kind,
            repr
        }
    }

    /// Returns kind of error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}


impl std::error::Error for Error {

    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::IoError(e) => Some(e),
            ErrorRepr::StringParseError(e) => Some(e),
            _ => None,
        }
    }
}


macro_rules! gen_error_kinds {
    ( $($kind:ident, $msg:literal), *) => {
        #[derive(Debug, PartialEq, Copy, Clone)]
        pub enum ErrorKind {
            $(
                $kind,
            )*
        }

        impl Error {
            pub fn str_desc(&self) -> &str {
                match self.kind {
                    $(
                        ErrorKind::$kind => $msg,
                    )*
                }
            }
        }
    };
}


macro_rules! gen_create_fun {
    ( $($kind:ident, $create_fun:ident), *) => {
        impl Error {
            $(
                #[inline]
                pub fn $create_fun() -> Self {
                    Self::new(ErrorKind::$kind, ErrorRepr::Simple)
                }
            )*
        }
    };

    ( $($kind:ident, $create_fun:ident, $repr:ident, $fun_arg:ty), *) => {
        impl Error {
            $(
                #[inline]
                pub fn $create_fun(e: $fun_arg) -> Self {
                    Self::new(ErrorKind::$kind, ErrorRepr::$repr(e))
                }
            )*
        }
    }
}


macro_rules! gen_error_repr {
    ($( $from_type:ty, $error_kind:ident, $fun_name:ident ), *) => {

        #[derive(Debug)]
        enum ErrorRepr {
            Simple,
            Message(String),
            $(
                $error_kind($from_type),
            )*
        }

        $(
            impl From<$from_type> for Error {
                fn from(error: $from_type) -> Self {
                    Error::new(ErrorKind::$error_kind, ErrorRepr::$error_kind(error))
                }
            }
        )*

        impl std::fmt::Display for Error {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> Result<(), std::fmt::Error> {
                write!(f, "{}", self.str_desc())?;
                match &self.repr {
                    $(
                        ErrorRepr::$error_kind(e) => write!(f, ": {}", e),
                    )*
                    ErrorRepr::Message(msg) => write!(f, ": {}", msg),
                    ErrorRepr::Simple => Ok(())
                }?;

                Ok(())
            }
        }

        impl Error {

            $(
                pub fn $fun_name(self) -> Option<$from_type> {
                    match self.repr {
                        ErrorRepr::$error_kind(e) => Some(e),
                        _ => None
                    }
                }
            )*
        }

    };
}


gen_error_kinds![
    IoError                         , "io error",
    StringParseError                , "string parse error",
    LockError                       , "lock failure",
    StorageReadError                , "failed to read block data from backing store",
    StorageWriteError               , "failed to write block data to backing store",
    AllocatorExhausted              , "backing store size limit reached, can't allocate more space",
    InvalidFreeRange                , "range does not match any occupied part of the backing store",
    IncorrectAllocationSize         , "incorrect allocation size",
    CorruptedBlock                  , "block data read from backing store can't be decoded",
    UnknownEvictionPolicy           , "unknown eviction policy"
];


gen_create_fun![
    LockError                       , lock_error                    ,
    AllocatorExhausted              , allocator_exhausted           ,
    IncorrectAllocationSize         , incorrect_allocation_size
];


gen_create_fun![
    StorageReadError                , storage_read_error            , IoError   , std::io::Error,
    StorageWriteError               , storage_write_error           , IoError   , std::io::Error,
    InvalidFreeRange                , invalid_free_range            , Message   , String,
    CorruptedBlock                  , corrupted_block               , Message   , String,
    UnknownEvictionPolicy           , unknown_eviction_policy       , Message   , String
];


gen_error_repr![
    std::io::Error, IoError, io_err,
    std::num::ParseIntError, StringParseError, string_parse_err
];
