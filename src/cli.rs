use clap::Parser;
use std::io::{self, Write};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde_json::Value;
use marquee::parser::{self, Command};
use marquee::{Movie, MovieFilter};

#[derive(Parser, Debug)]
#[clap(author, version, about = "Interactive movie catalog client", long_about = None)]
struct Args {
    /// Base URL of a running marquee server
    #[clap(long, env = "MARQUEE_SERVER", default_value = "http://127.0.0.1:3000")]
    server: String,
}

fn main() {
    let args = Args::parse();
    print_banner();

    let client = match ApiClient::new(&args.server) {
        Ok(client) => client,
        Err(e) => {
            println!("[\u{2717}] {}", e);
            return;
        }
    };

    match client.health() {
        Ok(()) => println!("[\u{2713}] Connected to marquee at {}!", args.server),
        Err(_) => {
            println!("[\u{2717}] Could not reach server at {}.", args.server);
            println!("    Make sure to run 'cargo run --bin marquee' in another terminal.");
            return;
        }
    }
    println!("Type 'HELP' for supported commands or 'EXIT' to quit.\n");

    let stdin = io::stdin();
    let mut buffer = String::new();

    loop {
        print!("marquee> ");
        let _ = io::stdout().flush();
        buffer.clear();

        match stdin.read_line(&mut buffer) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if buffer.trim().is_empty() { continue; }

        match parser::parse_command(&buffer) {
            Ok(Command::Exit) => break,
            Ok(cmd) => {
                if let Err(e) = client.execute(cmd) {
                    println!("[\u{26a0}\u{fe0f} Error] {}", e);
                }
            }
            Err(e) => {
                println!("[\u{2717} Syntax Error] {}", e);
                if buffer.to_uppercase().starts_with("ADD") {
                    println!("    \u{2139}\u{fe0f}  Hint: ADD \"Title\" BY \"Director\" YEAR 2021 GENRE \"Drama\" RATING 8.5");
                } else if buffer.to_uppercase().starts_with("UPDATE") {
                    println!("    \u{2139}\u{fe0f}  Hint: UPDATE 3 SET rating=9.0, title=\"New title\"");
                }
            }
        }
    }
}

fn print_banner() {
    println!("\n==================================================");
    println!("   marquee CLI - Movie Collection Client");
    println!("==================================================\n");
}

fn print_help() {
    println!("\n--- Available Commands ---");
    println!("1. LIST:    LIST [GENRE \"drama\"] [YEAR 2020] [MIN RATING 7.5] [SORT BY year|rating|title]");
    println!("2. GET:     GET 3");
    println!("3. SEARCH:  SEARCH \"blade\"");
    println!("4. ADD:     ADD \"Dune\" BY \"Villeneuve\" YEAR 2021 GENRE \"Sci-Fi\" RATING 8.5 [DESC \"...\"]");
    println!("5. UPDATE:  UPDATE 3 SET rating=9.0, description=\"...\"");
    println!("6. DELETE:  DELETE 3");
    println!("7. STATS:   Rating statistics");
    println!("8. HEALTH:  Server status");
    println!("9. EXIT:    Quit\n");
}

struct ApiClient {
    http: Client,
    base: Url,
}

impl ApiClient {
    fn new(server: &str) -> Result<Self, String> {
        let base = Url::parse(server).map_err(|e| format!("Invalid server URL '{}': {}", server, e))?;
        if base.cannot_be_a_base() {
            return Err(format!("Invalid server URL '{}'", server));
        }
        Ok(Self { http: Client::new(), base })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn execute(&self, cmd: Command) -> Result<(), String> {
        match cmd {
            Command::Help => { print_help(); Ok(()) },
            Command::List { filter, sort_by } => self.perform_list(&filter, sort_by.as_deref()),
            Command::Get { id } => self.perform_get(id),
            Command::Search { term } => self.perform_search(&term),
            Command::Add { movie } => {
                let data = send(self.http.post(self.url(&["api", "movies"])).json(&movie))?;
                let movie = as_movie(data)?;
                println!("[\u{2713} OK] Added #{} \"{}\"", movie.id, movie.title);
                Ok(())
            }
            Command::Update { id, patch } => {
                let data = send(self.http.put(self.url(&["api", "movies", &id.to_string()])).json(&patch))?;
                let movie = as_movie(data)?;
                println!("[\u{2713} OK] Updated #{}", movie.id);
                print_movie(&movie);
                Ok(())
            }
            Command::Delete { id } => {
                let data = send(self.http.delete(self.url(&["api", "movies", &id.to_string()])))?;
                let movie = as_movie(data)?;
                println!("[\u{2713} OK] Deleted #{} \"{}\"", movie.id, movie.title);
                Ok(())
            }
            Command::Stats => self.perform_stats(),
            Command::Health => {
                self.health()?;
                println!("[\u{2713}] Server is healthy.");
                Ok(())
            }
            Command::Exit => Ok(()),
        }
    }

    // --- NETWORK HANDLERS ---

    fn health(&self) -> Result<(), String> {
        let resp = self.http.get(self.url(&["api", "health"])).send().map_err(|e| e.to_string())?;
        if resp.status().is_success() { Ok(()) } else { Err(format!("HTTP {}", resp.status())) }
    }

    fn perform_list(&self, filter: &MovieFilter, sort_by: Option<&str>) -> Result<(), String> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if let Some(genre) = &filter.genre { params.push(("genre", genre.clone())); }
        if let Some(year) = filter.year { params.push(("year", year.to_string())); }
        if let Some(min) = filter.min_rating { params.push(("minRating", min.to_string())); }
        if let Some(key) = sort_by { params.push(("sortBy", key.to_string())); }

        let data = send(self.http.get(self.url(&["api", "movies"])).query(&params))?;
        print_movies(data)
    }

    fn perform_get(&self, id: u64) -> Result<(), String> {
        let data = send(self.http.get(self.url(&["api", "movies", &id.to_string()])))?;
        print_movie(&as_movie(data)?);
        Ok(())
    }

    fn perform_search(&self, term: &str) -> Result<(), String> {
        let data = send(self.http.get(self.url(&["api", "movies", "search", term])))?;
        print_movies(data)
    }

    fn perform_stats(&self) -> Result<(), String> {
        let data = send(self.http.get(self.url(&["api", "movies", "stats", "rating"])))?;
        if data.as_object().map_or(true, |o| o.is_empty()) {
            println!("No movies for statistics.");
            return Ok(());
        }

        println!("\nMovies:  {}", data["totalMovies"]);
        println!("Average: {}", data["averageRating"]);
        println!("Max/Min: {} / {}", data["maxRating"], data["minRating"]);
        println!("Distribution:");
        for bucket in ["0-2", "2-4", "4-6", "6-8", "8-10"] {
            let count = data["ratingDistribution"][bucket].as_u64().unwrap_or(0);
            println!("  {:>5} | {}", bucket, "#".repeat(count as usize));
        }
        println!();
        Ok(())
    }
}

/// Sends the request and unwraps the `{success, data}` envelope.
fn send(request: RequestBuilder) -> Result<Value, String> {
    let resp = request.send().map_err(|e| e.to_string())?;
    let status = resp.status();
    let body: Value = resp.json().map_err(|e| format!("HTTP {}: unreadable body ({})", status, e))?;

    if body["success"].as_bool() == Some(true) {
        return Ok(body["data"].clone());
    }

    let mut message = format!("HTTP {}: {}", status.as_u16(), body["error"].as_str().unwrap_or("request failed"));
    if let Some(details) = body["messages"].as_array() {
        for detail in details.iter().filter_map(Value::as_str) {
            message.push_str(&format!("\n    - {}", detail));
        }
    } else if let Some(detail) = body["message"].as_str() {
        message.push_str(&format!(" ({})", detail));
    }
    Err(message)
}

fn as_movie(data: Value) -> Result<Movie, String> {
    serde_json::from_value(data).map_err(|e| format!("Unexpected movie payload: {}", e))
}

fn print_movies(data: Value) -> Result<(), String> {
    let movies: Vec<Movie> = serde_json::from_value(data).map_err(|e| format!("Unexpected payload: {}", e))?;
    println!("\nFound {} movies:", movies.len());
    for movie in &movies {
        println!(
            "  \u{2022} #{:<4} {:<40} {:<6} {:<16} \u{2605} {:.1}",
            movie.id, movie.title, movie.year, movie.genre, movie.rating
        );
    }
    println!();
    Ok(())
}

fn print_movie(movie: &Movie) {
    println!("#{} {} ({})", movie.id, movie.title, movie.year);
    println!("  Director: {}", movie.director);
    println!("  Genre:    {}", movie.genre);
    println!("  Rating:   {:.1}", movie.rating);
    if !movie.description.is_empty() {
        println!("  About:    {}", movie.description);
    }
    println!("  Updated:  {}", marquee::model::iso_millis::format(&movie.updated_at));
}
